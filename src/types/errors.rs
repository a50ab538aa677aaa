//! Tipos de erro do callcache.

use std::path::PathBuf;

use thiserror::Error;

/// Tipo de resultado padrão do callcache.
pub type CacheResult<T> = Result<T, CacheError>;

/// Erros possíveis no cache.
///
/// Entradas corrompidas não aparecem aqui: são recuperadas localmente
/// (ver [`crate::cache::CorruptEntry`]).
#[derive(Error, Debug)]
pub enum CacheError {
    #[error("Não foi possível criar o diretório do cache em {path}: {source}")]
    StoreInit {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Erro de IO em {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Identidade de função inválida: '{0}'")]
    InvalidIdentity(String),

    #[error("Erro de serialização: {0}")]
    Serialization(String),

    #[error("Erro de configuração: {0}")]
    Config(String),

    #[error("Erro ao parsear TOML: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("Erro ao serializar TOML: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    #[error("Erro de JSON: {0}")]
    Json(#[from] serde_json::Error),
}

impl CacheError {
    /// Cria um erro de IO associado a um caminho.
    pub fn io<P: Into<PathBuf>>(path: P, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Cria um erro de configuração.
    pub fn config<S: Into<String>>(msg: S) -> Self {
        Self::Config(msg.into())
    }
}

/// Erro de uma chamada a uma função em cache.
///
/// Separa falhas do próprio cache das falhas da computação, que são
/// repassadas sem alteração.
#[derive(Error, Debug)]
pub enum CallError<E> {
    #[error(transparent)]
    Cache(#[from] CacheError),

    #[error("Falha na computação: {0}")]
    Computation(E),
}

impl<E> CallError<E> {
    /// Retorna o erro da computação, se for o caso.
    pub fn into_computation(self) -> Option<E> {
        match self {
            CallError::Computation(e) => Some(e),
            CallError::Cache(_) => None,
        }
    }
}
