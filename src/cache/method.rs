//! Memoização em memória para métodos de uma instância.
//!
//! Cada nome de método tem um slot: a primeira chamada calcula e guarda o
//! resultado, as seguintes o devolvem sem olhar os argumentos.

use std::any::Any;
use std::cell::RefCell;
use std::collections::HashMap;

/// Slots de resultados por nome de método.
///
/// Pensado para ser um campo da struct cujos métodos são memoizados.
/// Não é `Sync`.
#[derive(Default)]
pub struct MethodCache {
    slots: RefCell<HashMap<String, Box<dyn Any>>>,
}

impl MethodCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Retorna o valor guardado para `name` ou calcula com `compute`.
    ///
    /// Um valor de outro tipo sob o mesmo nome é substituído.
    pub fn get_or_compute<T, F>(&self, name: &str, compute: F) -> T
    where
        T: Clone + 'static,
        F: FnOnce() -> T,
    {
        if let Some(value) = self.lookup::<T>(name) {
            return value;
        }

        // O borrow não pode estar ativo aqui: `compute` pode usar o cache.
        let value = compute();
        self.store(name, value.clone());
        value
    }

    /// Como [`get_or_compute`](Self::get_or_compute), mas erros não são guardados.
    pub fn try_get_or_compute<T, E, F>(&self, name: &str, compute: F) -> Result<T, E>
    where
        T: Clone + 'static,
        F: FnOnce() -> Result<T, E>,
    {
        if let Some(value) = self.lookup::<T>(name) {
            return Ok(value);
        }

        let value = compute()?;
        self.store(name, value.clone());
        Ok(value)
    }

    pub fn is_cached(&self, name: &str) -> bool {
        self.slots.borrow().contains_key(name)
    }

    /// Descarta o valor de `name`. Retorna `true` se existia.
    pub fn invalidate(&self, name: &str) -> bool {
        self.slots.borrow_mut().remove(name).is_some()
    }

    pub fn clear(&self) {
        self.slots.borrow_mut().clear();
    }

    pub fn len(&self) -> usize {
        self.slots.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.borrow().is_empty()
    }

    fn lookup<T: Clone + 'static>(&self, name: &str) -> Option<T> {
        let slots = self.slots.borrow();
        let slot = slots.get(name)?;
        match slot.downcast_ref::<T>() {
            Some(value) => Some(value.clone()),
            None => {
                tracing::debug!("Tipo diferente no slot {}, recalculando", name);
                None
            }
        }
    }

    fn store<T: 'static>(&self, name: &str, value: T) {
        self.slots
            .borrow_mut()
            .insert(name.to_string(), Box::new(value));
    }
}

impl std::fmt::Debug for MethodCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let slots = self.slots.borrow();
        let mut names: Vec<&String> = slots.keys().collect();
        names.sort();
        f.debug_struct("MethodCache").field("slots", &names).finish()
    }
}
