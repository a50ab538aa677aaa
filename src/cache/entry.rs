//! Formato persistido de uma entrada do cache.
//!
//! Cada arquivo guarda um envelope JSON com metadados de validação
//! (versão do formato, identidade e checksum SHA-256) e duas cópias da
//! chamada: os campos `packed_*`, em MessagePack codificado em hex, são
//! a fonte dos argumentos comparados e do resultado devolvido; `args`,
//! `kwargs` e `data` são uma cópia JSON para leitura humana.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use thiserror::Error;

use super::args::{ArgValue, CallArgs, Kwargs};
use super::packed::{pack, unpack};
use crate::types::errors::CacheResult;

/// Versão atual do formato. Incrementar em mudanças incompatíveis.
pub const ENTRY_FORMAT_VERSION: u32 = 2;

/// Resultado armazenado de uma função, com os argumentos que o produziram.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheEntry<R> {
    /// Nome que identifica a função dentro do diretório do cache.
    pub function_identity: String,

    /// Argumentos posicionais e nomeados da chamada.
    pub call: CallArgs,

    /// Resultado da função.
    pub payload: R,

    /// Momento da gravação.
    pub stored_at: DateTime<Utc>,
}

impl<R> CacheEntry<R> {
    /// Cria uma entrada com o horário atual.
    pub fn new(function_identity: impl Into<String>, call: CallArgs, payload: R) -> Self {
        Self {
            function_identity: function_identity.into(),
            call,
            payload,
            stored_at: Utc::now(),
        }
    }

    /// Argumentos posicionais gravados, em JSON.
    pub fn call_args(&self) -> Vec<Value> {
        self.call.display_args()
    }

    /// Argumentos nomeados gravados.
    pub fn call_kwargs(&self) -> &Kwargs {
        &self.call.kwargs
    }

    /// Verifica se os argumentos gravados são iguais aos de `call`.
    pub fn matches(&self, call: &CallArgs) -> bool {
        self.call == *call
    }
}

/// Envelope serializado em disco.
#[derive(Debug, Serialize, Deserialize)]
struct EntryFile {
    format_version: u32,
    identity: String,
    stored_at: DateTime<Utc>,
    checksum: String,
    args: Value,
    kwargs: BTreeMap<String, Value>,
    data: Value,
    packed_args: String,
    packed_kwargs: BTreeMap<String, String>,
    packed_data: String,
}

/// Motivo pelo qual uma entrada gravada não pôde ser lida.
///
/// Nunca chega ao chamador: a entrada é apagada e recalculada.
#[derive(Error, Debug)]
pub enum CorruptEntry {
    #[error("arquivo ilegível: {0}")]
    Unreadable(std::io::Error),

    #[error("conteúdo malformado: {0}")]
    Malformed(String),

    #[error("versão de formato {found}, esperada {expected}")]
    VersionMismatch { expected: u32, found: u32 },

    #[error("entrada pertence a '{found}', esperada '{expected}'")]
    IdentityMismatch { expected: String, found: String },

    #[error("checksum não confere: esperado {expected}, calculado {actual}")]
    ChecksumMismatch { expected: String, actual: String },

    #[error("resultado incompatível com o tipo pedido: {0}")]
    PayloadType(String),
}

/// Resultado da leitura de uma entrada.
#[derive(Debug)]
pub enum EntryRead<R> {
    /// Não existe arquivo para a identidade.
    Missing,
    /// Entrada válida.
    Valid(CacheEntry<R>),
    /// Arquivo existe mas não é uma entrada válida.
    Corrupt(CorruptEntry),
}

impl<R> EntryRead<R> {
    pub fn is_valid(&self) -> bool {
        matches!(self, EntryRead::Valid(_))
    }

    pub fn is_corrupt(&self) -> bool {
        matches!(self, EntryRead::Corrupt(_))
    }
}

/// Checksum hexadecimal de todos os campos de conteúdo do envelope.
fn checksum(file: &EntryFile) -> String {
    let mut hasher = Sha256::new();
    let mut feed = |bytes: &[u8]| {
        hasher.update((bytes.len() as u64).to_le_bytes());
        hasher.update(bytes);
    };

    feed(file.packed_args.as_bytes());
    for (name, value) in &file.packed_kwargs {
        feed(name.as_bytes());
        feed(value.as_bytes());
    }
    feed(file.packed_data.as_bytes());

    let display = serde_json::to_vec(&(&file.args, &file.kwargs, &file.data)).unwrap_or_default();
    feed(&display);

    hex::encode(hasher.finalize())
}

/// Serializa uma entrada para os bytes gravados em disco.
pub(crate) fn encode_entry<R: Serialize>(entry: &CacheEntry<R>) -> CacheResult<Vec<u8>> {
    let call = &entry.call;
    let mut file = EntryFile {
        format_version: ENTRY_FORMAT_VERSION,
        identity: entry.function_identity.clone(),
        stored_at: entry.stored_at,
        checksum: String::new(),
        args: call.positional.display().clone(),
        kwargs: call.kwargs.display(),
        data: serde_json::to_value(&entry.payload).unwrap_or(Value::Null),
        packed_args: hex::encode(call.positional.packed()),
        packed_kwargs: call
            .kwargs
            .iter()
            .map(|(name, value)| (name.to_string(), hex::encode(value.packed())))
            .collect(),
        packed_data: hex::encode(pack(&entry.payload)?),
    };
    file.checksum = checksum(&file);
    Ok(serde_json::to_vec_pretty(&file)?)
}

/// Decodifica e valida o envelope, sem interpretar o resultado.
fn decode_envelope(identity: &str, bytes: &[u8]) -> Result<(EntryFile, CallArgs), CorruptEntry> {
    let file: EntryFile =
        serde_json::from_slice(bytes).map_err(|e| CorruptEntry::Malformed(e.to_string()))?;

    if file.format_version != ENTRY_FORMAT_VERSION {
        return Err(CorruptEntry::VersionMismatch {
            expected: ENTRY_FORMAT_VERSION,
            found: file.format_version,
        });
    }

    if file.identity != identity {
        return Err(CorruptEntry::IdentityMismatch {
            expected: identity.to_string(),
            found: file.identity,
        });
    }

    let actual = checksum(&file);
    if actual != file.checksum {
        return Err(CorruptEntry::ChecksumMismatch {
            expected: file.checksum,
            actual,
        });
    }

    let mut kwargs = Kwargs::new();
    for (name, value) in &file.packed_kwargs {
        let shown = file.kwargs.get(name).cloned().unwrap_or(Value::Null);
        kwargs.insert_value(name.clone(), ArgValue::from_parts(from_hex(value)?, shown));
    }
    let call = CallArgs {
        positional: ArgValue::from_parts(from_hex(&file.packed_args)?, file.args.clone()),
        kwargs,
    };

    Ok((file, call))
}

fn from_hex(field: &str) -> Result<Vec<u8>, CorruptEntry> {
    hex::decode(field).map_err(|e| CorruptEntry::Malformed(e.to_string()))
}

/// Decodifica e valida os bytes de uma entrada.
pub(crate) fn decode_entry<R: DeserializeOwned>(
    identity: &str,
    bytes: &[u8],
) -> Result<CacheEntry<R>, CorruptEntry> {
    let (file, call) = decode_envelope(identity, bytes)?;
    let packed = from_hex(&file.packed_data)?;
    let payload = unpack(&packed).map_err(|e| CorruptEntry::PayloadType(e.to_string()))?;

    Ok(CacheEntry {
        function_identity: file.identity,
        call,
        payload,
        stored_at: file.stored_at,
    })
}

/// Como [`decode_entry`], mas devolve a cópia JSON do resultado.
pub(crate) fn decode_entry_display(
    identity: &str,
    bytes: &[u8],
) -> Result<CacheEntry<Value>, CorruptEntry> {
    let (file, call) = decode_envelope(identity, bytes)?;

    Ok(CacheEntry {
        function_identity: file.identity,
        call,
        payload: file.data,
        stored_at: file.stored_at,
    })
}
