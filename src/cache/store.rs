//! Armazenamento em disco: um arquivo por identidade de função.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use super::entry::{
    decode_entry, decode_entry_display, encode_entry, CacheEntry, CorruptEntry, EntryRead,
};
use crate::types::errors::{CacheError, CacheResult};

/// Diretório de entradas do cache.
///
/// Não há locks: processos concorrentes no mesmo diretório podem
/// sobrescrever a entrada um do outro ou ler um arquivo parcialmente
/// gravado. A leitura seguinte trata esse caso como corrupção.
#[derive(Debug, Clone)]
pub struct EntryStore {
    root: PathBuf,
}

impl EntryStore {
    /// Cria o store sem tocar no disco.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Diretório raiz.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Garante que o diretório raiz existe.
    pub fn ensure_root(&self) -> CacheResult<()> {
        std::fs::create_dir_all(&self.root).map_err(|source| CacheError::StoreInit {
            path: self.root.clone(),
            source,
        })
    }

    /// Caminho do arquivo de uma identidade.
    pub fn entry_path(&self, identity: &str) -> PathBuf {
        self.root.join(identity)
    }

    pub fn exists(&self, identity: &str) -> bool {
        self.entry_path(identity).is_file()
    }

    /// Lê e valida a entrada de `identity`.
    pub fn read<R: DeserializeOwned>(&self, identity: &str) -> EntryRead<R> {
        self.read_with(identity, decode_entry::<R>)
    }

    /// Leitura sem tipo, para inspeção: o resultado vem da cópia JSON.
    pub fn inspect(&self, identity: &str) -> EntryRead<Value> {
        self.read_with(identity, decode_entry_display)
    }

    fn read_with<R>(
        &self,
        identity: &str,
        decode: impl FnOnce(&str, &[u8]) -> Result<CacheEntry<R>, CorruptEntry>,
    ) -> EntryRead<R> {
        let path = self.entry_path(identity);
        let bytes = match std::fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return EntryRead::Missing,
            Err(e) => return EntryRead::Corrupt(CorruptEntry::Unreadable(e)),
        };

        match decode(identity, &bytes) {
            Ok(entry) => EntryRead::Valid(entry),
            Err(reason) => EntryRead::Corrupt(reason),
        }
    }

    /// Grava a entrada, substituindo o arquivo inteiro.
    pub fn write<R: Serialize>(&self, entry: &CacheEntry<R>) -> CacheResult<()> {
        self.ensure_root()?;
        let bytes = encode_entry(entry)?;
        let path = self.entry_path(&entry.function_identity);
        std::fs::write(&path, bytes).map_err(|e| CacheError::io(path, e))
    }

    /// Remove a entrada de `identity`. Retorna `true` se existia.
    pub fn remove(&self, identity: &str) -> CacheResult<bool> {
        let path = self.entry_path(identity);
        match std::fs::remove_file(&path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(CacheError::io(path, e)),
        }
    }

    /// Identidades presentes no diretório, em ordem alfabética.
    ///
    /// Um diretório inexistente é um store vazio.
    pub fn list(&self) -> CacheResult<Vec<String>> {
        let entries = match std::fs::read_dir(&self.root) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(CacheError::io(&self.root, e)),
        };

        let mut identities = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| CacheError::io(&self.root, e))?;
            let path = entry.path();
            if !path.is_file() {
                continue;
            }
            if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
                if is_valid_identity(name) {
                    identities.push(name.to_string());
                }
            }
        }
        identities.sort();
        Ok(identities)
    }

    /// Remove todas as entradas. Retorna quantas foram apagadas.
    pub fn clear(&self) -> CacheResult<usize> {
        let mut removed = 0;
        for identity in self.list()? {
            if self.remove(&identity)? {
                removed += 1;
            }
        }
        Ok(removed)
    }
}

/// Identidades viram nomes de arquivo: sem separadores nem `.`/`..`.
pub fn is_valid_identity(identity: &str) -> bool {
    !identity.is_empty()
        && identity != "."
        && identity != ".."
        && identity
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'))
}

/// Valida uma identidade, retornando erro se inválida.
pub fn validate_identity(identity: &str) -> CacheResult<()> {
    if is_valid_identity(identity) {
        Ok(())
    } else {
        Err(CacheError::InvalidIdentity(identity.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::args::CallArgs;
    use tempfile::TempDir;

    fn make_store() -> (TempDir, EntryStore) {
        let dir = TempDir::new().unwrap();
        let store = EntryStore::new(dir.path().join(".picklecache"));
        (dir, store)
    }

    fn entry(identity: &str, x: i64) -> CacheEntry<i64> {
        CacheEntry::new(identity, CallArgs::positional(&(x,)).unwrap(), x * x)
    }

    #[test]
    fn test_missing_entry() {
        let (_dir, store) = make_store();
        assert!(matches!(store.read::<i64>("square"), EntryRead::Missing));
    }

    #[test]
    fn test_write_creates_root_lazily() {
        let (_dir, store) = make_store();
        assert!(!store.root().exists());

        store.write(&entry("square", 3)).unwrap();
        assert!(store.root().is_dir());
        assert!(store.exists("square"));
    }

    #[test]
    fn test_write_then_read() {
        let (_dir, store) = make_store();
        store.write(&entry("square", 4)).unwrap();

        match store.read::<i64>("square") {
            EntryRead::Valid(e) => {
                assert_eq!(e.payload, 16);
                assert_eq!(e.call_args(), vec![Value::from(4)]);
            }
            other => panic!("esperava entrada válida, obtido {other:?}"),
        }
    }

    #[test]
    fn test_write_overwrites() {
        let (_dir, store) = make_store();
        store.write(&entry("square", 4)).unwrap();
        store.write(&entry("square", 5)).unwrap();

        assert_eq!(store.list().unwrap(), vec!["square".to_string()]);
        match store.read::<i64>("square") {
            EntryRead::Valid(e) => assert_eq!(e.payload, 25),
            other => panic!("esperava entrada válida, obtido {other:?}"),
        }
    }

    #[test]
    fn test_zero_byte_file_is_corrupt() {
        let (_dir, store) = make_store();
        store.write(&entry("square", 4)).unwrap();
        std::fs::write(store.entry_path("square"), b"").unwrap();

        assert!(store.read::<i64>("square").is_corrupt());
    }

    #[test]
    fn test_directory_at_entry_path_is_unreadable() {
        let (_dir, store) = make_store();
        std::fs::create_dir_all(store.entry_path("square")).unwrap();

        assert!(store.read::<i64>("square").is_corrupt());
    }

    #[test]
    fn test_remove_and_clear() {
        let (_dir, store) = make_store();
        store.write(&entry("a", 1)).unwrap();
        store.write(&entry("b", 2)).unwrap();
        store.write(&entry("c", 3)).unwrap();

        assert!(store.remove("a").unwrap());
        assert!(!store.remove("a").unwrap());
        assert_eq!(store.clear().unwrap(), 2);
        assert!(store.list().unwrap().is_empty());
    }

    #[test]
    fn test_list_on_missing_root() {
        let (_dir, store) = make_store();
        assert!(store.list().unwrap().is_empty());
    }

    #[test]
    fn test_inspect_is_untyped() {
        let (_dir, store) = make_store();
        store.write(&entry("square", 6)).unwrap();

        match store.inspect("square") {
            EntryRead::Valid(e) => assert_eq!(e.payload, Value::from(36)),
            other => panic!("esperava entrada válida, obtido {other:?}"),
        }
    }

    #[test]
    fn test_identity_rules() {
        assert!(is_valid_identity("square"));
        assert!(is_valid_identity("load_dataset.v2"));
        assert!(is_valid_identity("train-model"));
        assert!(!is_valid_identity(""));
        assert!(!is_valid_identity("."));
        assert!(!is_valid_identity(".."));
        assert!(!is_valid_identity("a/b"));
        assert!(!is_valid_identity("mod::func"));
        assert!(validate_identity("../etc").is_err());
    }
}
