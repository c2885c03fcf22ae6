use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use crate::error::{MappingError, Result};

type Compiled = Arc<dyn Any + Send + Sync>;
type Outcome = std::result::Result<Compiled, MappingError>;
type Slot = Arc<Mutex<Option<Outcome>>>;

/// Record type plus the identity of the converter registry it was compiled with.
pub(crate) type SlotKey = (TypeId, u64);

/// Compiled schemas keyed by record type and converter registry.
///
/// Compilers with different registries can share a cache: each gets its own schema per type.
/// Create one per process (or per test) and share it between compilers. Each type has its own
/// slot lock: concurrent first compilations of the same type run the compiler once and every
/// caller observes that single outcome, while different types compile in parallel. Failed
/// compilations are cached as well.
#[derive(Default)]
pub struct SchemaCache {
    entries: Mutex<HashMap<SlotKey, Slot>>,
    compilations: AtomicUsize,
}

impl SchemaCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of compiler executions so far.
    pub fn compilations(&self) -> usize {
        self.compilations.load(Ordering::SeqCst)
    }

    /// Number of cached outcomes, successful or not.
    pub fn len(&self) -> usize {
        let slots: Vec<Slot> = {
            let entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
            entries.values().cloned().collect()
        };
        slots
            .iter()
            .filter(|slot| slot.lock().unwrap_or_else(PoisonError::into_inner).is_some())
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub(crate) fn get_or_compile<S, F>(&self, key: SlotKey, compile: F) -> Result<Arc<S>>
    where
        S: Any + Send + Sync,
        F: FnOnce() -> Result<S>,
    {
        let slot = {
            let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
            Arc::clone(entries.entry(key).or_default())
        };

        // Held for the whole compilation so that callers for the same type wait on it.
        let mut outcome = slot.lock().unwrap_or_else(PoisonError::into_inner);
        let compiled = match outcome.as_ref() {
            Some(cached) => cached.clone(),
            None => {
                self.compilations.fetch_add(1, Ordering::SeqCst);
                let fresh = compile().map(|schema| Arc::new(schema) as Compiled);
                *outcome = Some(fresh.clone());
                fresh
            }
        };
        drop(outcome);

        compiled?
            .downcast::<S>()
            .map_err(|_| MappingError::config("SchemaCache", "cached schema has a different type"))
    }
}

impl std::fmt::Debug for SchemaCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SchemaCache")
            .field("compilations", &self.compilations())
            .finish_non_exhaustive()
    }
}
