//! Implementação dos comandos CLI do callcache.

use std::path::{Path, PathBuf};

use crate::cache::{validate_identity, EntryRead, EntryStore};
use crate::types::config::{Config, CONFIG_FILE};
use crate::CacheResult;

/// Initializes configuration in the specified directory.
pub fn init(path: Option<PathBuf>) -> CacheResult<()> {
    let target_dir = path.unwrap_or_else(|| PathBuf::from("."));

    // Create directory if it doesn't exist
    if !target_dir.exists() {
        std::fs::create_dir_all(&target_dir)
            .map_err(|e| crate::CacheError::io(&target_dir, e))?;
        tracing::info!("Directory created: {}", target_dir.display());
    }

    let config_path = target_dir.join(CONFIG_FILE);

    if config_path.exists() {
        println!("Configuration already exists at: {}", config_path.display());
        return Ok(());
    }

    let config = Config::default_config();

    let store = EntryStore::new(target_dir.join(&config.store.root));
    store.ensure_root()?;
    tracing::info!("Store directory created: {}", store.root().display());

    update_gitignore(&target_dir, &config.store.root)?;

    config.save(&config_path)?;

    println!("callcache initialized successfully!");
    println!("Configuration created at: {}", config_path.display());
    println!("Store directory: {}", config.store.root.display());

    Ok(())
}

/// Updates or creates .gitignore to include the store directory.
fn update_gitignore(target_dir: &Path, store_root: &Path) -> CacheResult<()> {
    let gitignore_path = target_dir.join(".gitignore");
    let bare = store_root.display().to_string();
    let entry = format!("{}/", bare.trim_end_matches('/'));
    let comment = "# callcache - persistent call cache";

    if gitignore_path.exists() {
        let content = std::fs::read_to_string(&gitignore_path)
            .map_err(|e| crate::CacheError::io(&gitignore_path, e))?;

        if content
            .lines()
            .any(|line| line.trim() == entry || line.trim() == bare)
        {
            tracing::debug!(".gitignore already contains {}", entry);
            return Ok(());
        }

        // Append to end of file
        let mut new_content = content.trim_end().to_string();
        if !new_content.is_empty() {
            new_content.push_str("\n\n");
        }
        new_content.push_str(comment);
        new_content.push('\n');
        new_content.push_str(&entry);
        new_content.push('\n');

        std::fs::write(&gitignore_path, new_content)
            .map_err(|e| crate::CacheError::io(&gitignore_path, e))?;
        println!(".gitignore updated with {}", entry);
    } else {
        let content = format!("{}\n{}\n", comment, entry);
        std::fs::write(&gitignore_path, content)
            .map_err(|e| crate::CacheError::io(&gitignore_path, e))?;
        println!(".gitignore created with {}", entry);
    }

    Ok(())
}

/// Lista as entradas do cache.
pub fn list(config: &Config) -> CacheResult<()> {
    let store = EntryStore::new(&config.store.root);
    let identities = store.list()?;

    if identities.is_empty() {
        println!("Nenhuma entrada em {}", store.root().display());
        return Ok(());
    }

    println!("Entradas em {}:\n", store.root().display());

    for identity in identities {
        let size = std::fs::metadata(store.entry_path(&identity))
            .map(|m| m.len())
            .unwrap_or(0);

        match store.inspect(&identity) {
            EntryRead::Valid(entry) => println!(
                "  ✓ {} - {} bytes, gravada em {}",
                identity,
                size,
                entry.stored_at.format("%Y-%m-%d %H:%M:%S UTC")
            ),
            EntryRead::Corrupt(reason) => {
                println!("  ✗ {} - corrompida ({})", identity, reason)
            }
            EntryRead::Missing => {}
        }
    }

    Ok(())
}

/// Mostra uma entrada.
pub fn show(identity: &str, config: &Config) -> CacheResult<()> {
    validate_identity(identity)?;
    let store = EntryStore::new(&config.store.root);

    match store.inspect(identity) {
        EntryRead::Valid(entry) => {
            println!("Função: {}", entry.function_identity);
            println!("Gravada em: {}", entry.stored_at.to_rfc3339());
            println!("args: {}", serde_json::to_string_pretty(&entry.call_args())?);
            println!(
                "kwargs: {}",
                serde_json::to_string_pretty(&entry.call_kwargs().display())?
            );
            println!("data: {}", serde_json::to_string_pretty(&entry.payload)?);
        }
        EntryRead::Corrupt(reason) => {
            println!("Entrada '{}' corrompida: {}", identity, reason);
        }
        EntryRead::Missing => {
            println!("Nenhuma entrada para '{}'", identity);
        }
    }

    Ok(())
}

/// Remove uma entrada ou todas.
pub fn clear(identity: Option<&str>, config: &Config) -> CacheResult<()> {
    let store = EntryStore::new(&config.store.root);

    match identity {
        Some(identity) => {
            validate_identity(identity)?;
            if store.remove(identity)? {
                tracing::info!("Entrada removida: {}", identity);
                println!("Entrada '{}' removida", identity);
            } else {
                println!("Nenhuma entrada para '{}'", identity);
            }
        }
        None => {
            let removed = store.clear()?;
            println!("{} entrada(s) removida(s)", removed);
        }
    }

    Ok(())
}

/// Verifica a integridade das entradas.
pub fn verify(prune: bool, config: &Config) -> CacheResult<()> {
    let store = EntryStore::new(&config.store.root);
    let identities = store.list()?;

    let mut corrupt: Vec<String> = Vec::new();
    for identity in &identities {
        if let EntryRead::Corrupt(reason) = store.inspect(identity) {
            println!("  ✗ {} - {}", identity, reason);
            corrupt.push(identity.clone());
        }
    }

    println!(
        "{} entrada(s) verificada(s), {} corrompida(s)",
        identities.len(),
        corrupt.len()
    );

    if prune {
        for identity in &corrupt {
            store.remove(identity)?;
            tracing::info!("Entrada corrompida removida: {}", identity);
        }
        if !corrupt.is_empty() {
            println!("{} entrada(s) corrompida(s) removida(s)", corrupt.len());
        }
    }

    Ok(())
}

/// Mostra versão.
pub fn version() {
    println!("callcache v{}", env!("CARGO_PKG_VERSION"));
}
