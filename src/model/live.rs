//! Live<T> - a shared model instance bound to a projection registry.

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::{debug, warn};

use super::LiveModel;
use crate::error::HandlerError;
use crate::registry::{EntitySubscription, ProjectionRegistry, RegistryError};

struct Binding {
    registry: ProjectionRegistry,
    subscription: EntitySubscription,
}

/// A model instance that merges the changes projected for it.
///
/// The instance lives behind an `Arc<Mutex<T>>`; the registry only holds a
/// weak reference to it, so dropping the `Live` both frees the model and
/// detaches it from the change channels.
pub struct Live<T: LiveModel> {
    model: Arc<Mutex<T>>,
    binding: Mutex<Option<Binding>>,
}

impl<T: LiveModel> Live<T> {
    pub fn new(model: T) -> Self {
        Self {
            model: Arc::new(Mutex::new(model)),
            binding: Mutex::new(None),
        }
    }

    /// Subscribe this instance under `<MODEL_NAME>:<id>` in `registry`.
    ///
    /// Any previous binding is released first. Returns how many
    /// denormalizers the instance now listens to; denormalizers registered
    /// later are not picked up until the next `bind`.
    ///
    /// An instance whose `model_id` is empty is refused with
    /// [`RegistryError::MissingEntityId`] and keeps its current binding.
    pub fn bind(&self, registry: &ProjectionRegistry) -> Result<usize, RegistryError> {
        if self.with(|model| model.model_id().is_empty()) {
            return Err(RegistryError::MissingEntityId {
                model: T::MODEL_NAME.to_string(),
            });
        }
        self.unbind()?;

        let key = self.with(|model| model.entity_key());
        let weak = Arc::downgrade(&self.model);
        let subscription = registry.subscribe_entity(&key, move |data| {
            let Some(model) = weak.upgrade() else {
                return Ok(());
            };
            let mut model = model
                .lock()
                .map_err(|_| HandlerError::Rejected(format!("{} lock poisoned", T::MODEL_NAME)))?;
            model.apply(data)
        })?;

        let attached = subscription.len();
        if attached == 0 {
            debug!(key = %key, "bound with no denormalizer registered for the model");
        }
        *self.binding_slot() = Some(Binding {
            registry: registry.clone(),
            subscription,
        });
        Ok(attached)
    }

    /// Release the registry binding. Returns whether the instance was bound.
    pub fn unbind(&self) -> Result<bool, RegistryError> {
        let Some(binding) = self.binding_slot().take() else {
            return Ok(false);
        };
        binding
            .registry
            .unsubscribe_entity(&binding.subscription)?;
        Ok(true)
    }

    pub fn is_bound(&self) -> bool {
        self.binding_slot().is_some()
    }

    pub fn id(&self) -> String {
        self.with(|model| model.model_id())
    }

    /// Read the current state.
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        f(&self.lock())
    }

    /// Change the current state locally.
    ///
    /// The binding keeps the key it was made with; re-`bind` after changing
    /// the id.
    pub fn update<R>(&self, f: impl FnOnce(&mut T) -> R) -> R {
        f(&mut self.lock())
    }

    pub fn snapshot(&self) -> T
    where
        T: Clone,
    {
        self.lock().clone()
    }

    fn lock(&self) -> MutexGuard<'_, T> {
        self.model.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn binding_slot(&self) -> MutexGuard<'_, Option<Binding>> {
        self.binding.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<T: LiveModel> Drop for Live<T> {
    fn drop(&mut self) {
        if let Err(err) = self.unbind() {
            warn!(model = T::MODEL_NAME, error = %err, "failed to unbind dropped model");
        }
    }
}

impl<T: LiveModel + fmt::Debug> fmt::Debug for Live<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Live")
            .field("model", &*self.lock())
            .field("bound", &self.is_bound())
            .finish()
    }
}
