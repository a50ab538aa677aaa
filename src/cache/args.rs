//! Argumentos de chamada capturados para comparação e persistência.

use std::collections::BTreeMap;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use super::packed::{pack_canonical, pack_fields, unpack};
use crate::types::errors::CacheResult;

/// Um valor de argumento.
///
/// A igualdade usa só a forma canônica em MessagePack, que distingue
/// `NaN` de `±inf` e `None` de lista vazia. A cópia JSON serve apenas
/// para exibição.
#[derive(Debug, Clone)]
pub struct ArgValue {
    packed: Vec<u8>,
    display: Value,
}

impl ArgValue {
    /// Captura `value`.
    pub fn encode<V: Serialize + ?Sized>(value: &V) -> CacheResult<Self> {
        Ok(Self {
            packed: pack_canonical(value)?,
            display: display_value(value),
        })
    }

    pub(crate) fn from_parts(packed: Vec<u8>, display: Value) -> Self {
        Self { packed, display }
    }

    /// Converte de volta para `T`. `None` se os bytes não formam um `T`.
    pub fn decode<T: DeserializeOwned>(&self) -> Option<T> {
        unpack(&self.packed).ok()
    }

    /// Bytes canônicos.
    pub fn packed(&self) -> &[u8] {
        &self.packed
    }

    /// Cópia JSON. Floats não finitos aparecem como `null`.
    pub fn display(&self) -> &Value {
        &self.display
    }
}

impl PartialEq for ArgValue {
    fn eq(&self, other: &Self) -> bool {
        self.packed == other.packed
    }
}

fn display_value<V: Serialize + ?Sized>(value: &V) -> Value {
    serde_json::to_value(value).unwrap_or(Value::Null)
}

/// Argumentos nomeados de uma chamada.
///
/// A igualdade compara o conjunto de nomes e os valores; a ordem de
/// inserção não importa.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Kwargs(BTreeMap<String, ArgValue>);

impl Kwargs {
    /// Cria um conjunto vazio.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adiciona um argumento nomeado.
    pub fn with<V: Serialize + ?Sized>(mut self, name: &str, value: &V) -> CacheResult<Self> {
        self.insert(name, value)?;
        Ok(self)
    }

    /// Insere ou substitui um argumento nomeado.
    pub fn insert<V: Serialize + ?Sized>(&mut self, name: &str, value: &V) -> CacheResult<()> {
        self.0.insert(name.to_string(), ArgValue::encode(value)?);
        Ok(())
    }

    /// Lê um argumento nomeado já convertido para `T`.
    ///
    /// Retorna `None` se o nome não existe ou se o valor não é um `T`.
    pub fn get<T: DeserializeOwned>(&self, name: &str) -> Option<T> {
        self.0.get(name).and_then(ArgValue::decode)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Pares nome/valor em ordem alfabética.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &ArgValue)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Cópia JSON de todos os argumentos.
    pub fn display(&self) -> BTreeMap<String, Value> {
        self.0
            .iter()
            .map(|(k, v)| (k.clone(), v.display.clone()))
            .collect()
    }

    pub(crate) fn insert_value(&mut self, name: String, value: ArgValue) {
        self.0.insert(name, value);
    }

    /// Constrói a partir de qualquer valor que serialize como mapa de
    /// nomes (structs, mapas com chave texto). `()` resulta em vazio.
    pub fn from_serialize<K: Serialize + ?Sized>(kwargs: &K) -> CacheResult<Self> {
        let display = match serde_json::to_value(kwargs) {
            Ok(Value::Object(map)) => map,
            _ => serde_json::Map::new(),
        };

        let mut out = Self::new();
        for (name, packed) in pack_fields(kwargs)? {
            let shown = display.get(&name).cloned().unwrap_or(Value::Null);
            out.insert_value(name, ArgValue::from_parts(packed, shown));
        }
        Ok(out)
    }
}

/// Argumentos posicionais e nomeados de uma chamada.
#[derive(Debug, Clone, PartialEq)]
pub struct CallArgs {
    /// Todos os argumentos posicionais, capturados como um único valor.
    pub positional: ArgValue,

    /// Argumentos nomeados.
    pub kwargs: Kwargs,
}

impl CallArgs {
    /// Captura os argumentos posicionais de `args`.
    pub fn positional<A: Serialize + ?Sized>(args: &A) -> CacheResult<Self> {
        Ok(Self {
            positional: ArgValue::encode(args)?,
            kwargs: Kwargs::new(),
        })
    }

    /// Anexa argumentos nomeados.
    pub fn with_kwargs(mut self, kwargs: Kwargs) -> Self {
        self.kwargs = kwargs;
        self
    }

    /// Lista posicional para exibição.
    ///
    /// Tuplas e sequências listam um argumento por elemento; qualquer
    /// outro valor, inclusive `null`, é um único argumento.
    pub fn display_args(&self) -> Vec<Value> {
        match &self.positional.display {
            Value::Array(items) => items.clone(),
            single => vec![single.clone()],
        }
    }
}
