//! # callcache
//!
//! Cache persistente de resultados de funções caras.
//!
//! Uma função envolvida pelo cache grava seu resultado em disco, junto
//! com os argumentos da chamada. Nas execuções seguintes o resultado é
//! lido do disco em vez de recalculado, enquanto os argumentos forem os
//! mesmos. Entradas corrompidas são descartadas e recalculadas.
//!
//! ## Módulos
//!
//! - [`cache`] - Cache persistente e memoização de métodos
//! - [`cli`] - Interface de linha de comando para manutenção do cache
//! - [`types`] - Configuração e erros

pub mod cache;
#[cfg(feature = "cli")]
pub mod cli;
pub mod types;

pub use cache::{
    CacheEntry, CachedFn, CallArgs, CallStats, EntryStore, Kwargs, MethodCache,
    PersistentCallCache, WrapOptions,
};
pub use types::config::Config;
pub use types::errors::{CacheError, CacheResult, CallError};
