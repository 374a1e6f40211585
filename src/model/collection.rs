//! ModelCollection - the set of live instances a creation denormalizer fills.

use std::sync::{Arc, PoisonError, RwLock};

use tracing::{debug, warn};

use super::{Live, LiveModel};
use crate::registry::{ProjectionRegistry, RegistryError};

/// An ordered, id-keyed collection of live model instances.
///
/// Cloning yields another handle to the same collection, so it can be
/// captured by a denormalizer and read by the application at the same time.
pub struct ModelCollection<T: LiveModel> {
    items: Arc<RwLock<Vec<Arc<Live<T>>>>>,
}

impl<T: LiveModel> Clone for ModelCollection<T> {
    fn clone(&self) -> Self {
        Self {
            items: Arc::clone(&self.items),
        }
    }
}

impl<T: LiveModel> Default for ModelCollection<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: LiveModel> ModelCollection<T> {
    pub fn new() -> Self {
        Self {
            items: Arc::new(RwLock::new(Vec::new())),
        }
    }

    /// Add an instance, replacing (and unbinding) one with the same id.
    pub fn insert(&self, live: Live<T>) -> Arc<Live<T>> {
        let live = Arc::new(live);
        let id = live.id();
        let replaced = {
            let mut items = self.items.write().unwrap_or_else(PoisonError::into_inner);
            match items.iter().position(|item| item.id() == id) {
                Some(index) => Some(std::mem::replace(&mut items[index], Arc::clone(&live))),
                None => {
                    items.push(Arc::clone(&live));
                    None
                }
            }
        };
        if let Some(old) = replaced {
            debug!(model = T::MODEL_NAME, id = %id, "replacing instance in collection");
            release(&old);
        }
        live
    }

    /// Wrap `model`, bind it to `registry` and add it.
    pub fn insert_bound(
        &self,
        model: T,
        registry: &ProjectionRegistry,
    ) -> Result<Arc<Live<T>>, RegistryError> {
        let live = Live::new(model);
        live.bind(registry)?;
        Ok(self.insert(live))
    }

    /// Remove the instance with `id` and unbind it.
    pub fn remove(&self, id: &str) -> Option<Arc<Live<T>>> {
        let removed = {
            let mut items = self.items.write().unwrap_or_else(PoisonError::into_inner);
            let index = items.iter().position(|item| item.id() == id)?;
            items.remove(index)
        };
        release(&removed);
        Some(removed)
    }

    pub fn get(&self, id: &str) -> Option<Arc<Live<T>>> {
        self.read().iter().find(|item| item.id() == id).cloned()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.get(id).is_some()
    }

    /// Instance ids in insertion order.
    pub fn ids(&self) -> Vec<String> {
        self.read().iter().map(|item| item.id()).collect()
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    /// Current state of every instance, in insertion order.
    pub fn snapshot(&self) -> Vec<T>
    where
        T: Clone,
    {
        self.read().iter().map(|item| item.snapshot()).collect()
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, Vec<Arc<Live<T>>>> {
        self.items.read().unwrap_or_else(PoisonError::into_inner)
    }
}

fn release<T: LiveModel>(live: &Live<T>) {
    if let Err(err) = live.unbind() {
        warn!(model = T::MODEL_NAME, error = %err, "failed to unbind removed instance");
    }
}
