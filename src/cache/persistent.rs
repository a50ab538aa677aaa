//! Cache persistente de resultados de funções.

use std::marker::PhantomData;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::Serialize;

use super::args::{CallArgs, Kwargs};
use super::entry::{CacheEntry, EntryRead};
use super::store::{validate_identity, EntryStore};
use crate::types::config::{Config, DefaultsConfig};
use crate::types::errors::{CacheResult, CallError};

/// Opções aplicadas ao envolver uma função.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WrapOptions {
    /// Só reutiliza o resultado se os argumentos forem iguais aos gravados.
    pub match_args: bool,

    /// Apaga a entrada existente no momento do `wrap`.
    pub reset: bool,
}

impl Default for WrapOptions {
    fn default() -> Self {
        Self {
            match_args: true,
            reset: false,
        }
    }
}

impl WrapOptions {
    pub fn match_args(mut self, match_args: bool) -> Self {
        self.match_args = match_args;
        self
    }

    pub fn reset(mut self, reset: bool) -> Self {
        self.reset = reset;
        self
    }
}

impl From<&DefaultsConfig> for WrapOptions {
    fn from(defaults: &DefaultsConfig) -> Self {
        Self {
            match_args: defaults.match_args,
            reset: defaults.reset,
        }
    }
}

/// Estatísticas de uma função em cache.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CallStats {
    /// Chamadas resolvidas pelo cache.
    pub hits: u64,

    /// Chamadas que executaram a função.
    pub misses: u64,

    /// Entradas corrompidas descartadas.
    pub corrupt_resets: u64,
}

impl CallStats {
    /// Calcula a taxa de acerto.
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

/// Cache persistente com uma entrada por função.
///
/// Cada função envolvida tem um único slot no diretório: uma chamada com
/// argumentos diferentes sobrescreve o resultado anterior.
///
/// ## Exemplo
///
/// ```rust,ignore
/// use callcache::{Kwargs, PersistentCallCache, WrapOptions};
///
/// let cache = PersistentCallCache::open(".picklecache")?;
/// let mut square = cache.wrap("square", WrapOptions::default(), |&(x,): &(i64,), _: &Kwargs| {
///     Ok::<_, std::convert::Infallible>(x * x)
/// })?;
///
/// assert_eq!(square.call(&(4,))?, 16);
/// assert_eq!(square.call(&(4,))?, 16); // lido do disco
/// ```
#[derive(Debug, Clone)]
pub struct PersistentCallCache {
    store: EntryStore,
    defaults: WrapOptions,
}

impl PersistentCallCache {
    /// Abre (e cria, se preciso) o cache em `root`.
    pub fn open(root: impl Into<PathBuf>) -> CacheResult<Self> {
        let store = EntryStore::new(root);
        store.ensure_root()?;
        Ok(Self {
            store,
            defaults: WrapOptions::default(),
        })
    }

    /// Abre o cache no diretório configurado, usando os padrões do arquivo.
    pub fn from_config(config: &Config) -> CacheResult<Self> {
        let mut cache = Self::open(&config.store.root)?;
        cache.defaults = WrapOptions::from(&config.defaults);
        Ok(cache)
    }

    pub fn root(&self) -> &Path {
        self.store.root()
    }

    pub fn store(&self) -> &EntryStore {
        &self.store
    }

    /// Opções usadas por [`wrap_default`](Self::wrap_default).
    pub fn defaults(&self) -> WrapOptions {
        self.defaults
    }

    /// Envolve `func` sob a identidade `identity`.
    ///
    /// Com `options.reset`, a entrada existente é apagada aqui, uma única vez.
    pub fn wrap<A, R, E, F>(
        &self,
        identity: &str,
        options: WrapOptions,
        func: F,
    ) -> CacheResult<CachedFn<A, R, E, F>>
    where
        F: FnMut(&A, &Kwargs) -> Result<R, E>,
    {
        validate_identity(identity)?;
        self.store.ensure_root()?;

        if options.reset && self.store.remove(identity)? {
            tracing::info!("Cache resetado para a função {}", identity);
        }

        Ok(CachedFn {
            identity: identity.to_string(),
            options,
            store: self.store.clone(),
            func,
            stats: CallStats::default(),
            _marker: PhantomData,
        })
    }

    /// Como [`wrap`](Self::wrap), com as opções padrão do cache.
    pub fn wrap_default<A, R, E, F>(
        &self,
        identity: &str,
        func: F,
    ) -> CacheResult<CachedFn<A, R, E, F>>
    where
        F: FnMut(&A, &Kwargs) -> Result<R, E>,
    {
        self.wrap(identity, self.defaults, func)
    }

    /// Envolve uma função que só recebe argumentos posicionais.
    #[allow(clippy::type_complexity)]
    pub fn wrap_positional<A, R, E, F>(
        &self,
        identity: &str,
        options: WrapOptions,
        mut func: F,
    ) -> CacheResult<CachedFn<A, R, E, impl FnMut(&A, &Kwargs) -> Result<R, E>>>
    where
        F: FnMut(&A) -> Result<R, E>,
    {
        self.wrap(identity, options, move |args: &A, _: &Kwargs| func(args))
    }

    /// Apaga a entrada de `identity`. Retorna `true` se existia.
    pub fn invalidate(&self, identity: &str) -> CacheResult<bool> {
        validate_identity(identity)?;
        self.store.remove(identity)
    }

    /// Apaga todas as entradas.
    pub fn clear(&self) -> CacheResult<usize> {
        self.store.clear()
    }
}

/// Função envolvida pelo cache persistente.
pub struct CachedFn<A, R, E, F> {
    identity: String,
    options: WrapOptions,
    store: EntryStore,
    func: F,
    stats: CallStats,
    _marker: PhantomData<fn(&A) -> Result<R, E>>,
}

impl<A, R, E, F> CachedFn<A, R, E, F>
where
    A: Serialize,
    R: Serialize + DeserializeOwned,
    F: FnMut(&A, &Kwargs) -> Result<R, E>,
{
    /// Chama a função só com argumentos posicionais.
    pub fn call(&mut self, args: &A) -> Result<R, CallError<E>> {
        self.call_with(args, &Kwargs::new())
    }

    /// Chama a função com argumentos posicionais e nomeados.
    pub fn call_with(&mut self, args: &A, kwargs: &Kwargs) -> Result<R, CallError<E>> {
        self.store.ensure_root()?;
        let call = CallArgs::positional(args)?.with_kwargs(kwargs.clone());

        match self.store.read::<R>(&self.identity) {
            EntryRead::Valid(entry) => {
                if !self.options.match_args || entry.matches(&call) {
                    tracing::debug!("Carregando dados do cache para a função {}", self.identity);
                    self.stats.hits += 1;
                    return Ok(entry.payload);
                }
                tracing::debug!(
                    "Argumentos diferentes para a função {}, recalculando",
                    self.identity
                );
            }
            EntryRead::Missing => {
                tracing::debug!("Sem entrada para a função {}", self.identity);
            }
            EntryRead::Corrupt(reason) => {
                tracing::warn!(
                    "Cache corrompido ({}). Resetando cache para a função {}",
                    reason,
                    self.identity
                );
                self.stats.corrupt_resets += 1;
                if let Err(e) = self.store.remove(&self.identity) {
                    tracing::warn!("Falha ao remover entrada corrompida: {}", e);
                }
            }
        }

        self.compute_and_store(args, kwargs, call)
    }

    fn compute_and_store(
        &mut self,
        args: &A,
        kwargs: &Kwargs,
        call: CallArgs,
    ) -> Result<R, CallError<E>> {
        self.stats.misses += 1;
        let result = (self.func)(args, kwargs).map_err(CallError::Computation)?;

        let entry = CacheEntry::new(self.identity.as_str(), call, result);
        match self.store.write(&entry) {
            Ok(()) => tracing::debug!("Entrada gravada para a função {}", self.identity),
            Err(e) => tracing::warn!(
                "Não foi possível gravar o cache da função {}: {}",
                self.identity,
                e
            ),
        }

        Ok(entry.payload)
    }
}

impl<A, R, E, F> CachedFn<A, R, E, F> {
    pub fn identity(&self) -> &str {
        &self.identity
    }

    pub fn options(&self) -> WrapOptions {
        self.options
    }

    /// Retorna estatísticas das chamadas feitas por esta instância.
    pub fn stats(&self) -> CallStats {
        self.stats
    }

    /// Caminho do arquivo da entrada.
    pub fn entry_path(&self) -> PathBuf {
        self.store.entry_path(&self.identity)
    }
}

impl<A, R, E, F> std::fmt::Debug for CachedFn<A, R, E, F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CachedFn")
            .field("identity", &self.identity)
            .field("options", &self.options)
            .field("stats", &self.stats)
            .finish_non_exhaustive()
    }
}
