//! Cache persistente de chamadas de função.
//!
//! Este módulo guarda em disco o resultado de funções caras, junto com os
//! argumentos que o produziram, para reaproveitá-lo em execuções futuras
//! do mesmo programa.
//!
//! - [`PersistentCallCache`] abre o diretório e envolve funções
//! - [`EntryStore`] lê e grava um arquivo por função
//! - [`MethodCache`] memoiza métodos em memória, por instância

mod args;
mod entry;
mod method;
mod packed;
mod persistent;
mod store;

pub use args::{ArgValue, CallArgs, Kwargs};
pub use entry::{CacheEntry, CorruptEntry, EntryRead, ENTRY_FORMAT_VERSION};
pub use method::MethodCache;
pub use persistent::{CachedFn, CallStats, PersistentCallCache, WrapOptions};
pub use store::{is_valid_identity, validate_identity, EntryStore};
