//! ProjectionRegistry - fans dispatched events out to denormalizers.

use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::time::{Duration, Instant};

use serde_json::Value;
use tracing::{debug, warn};

use super::correlation::{Correlations, ObservationId};
use super::error::RegistryError;
use crate::bus::{panic_message, BusError, DispatchGate, SubscriptionId};
use crate::denormalizer::Denormalizer;
use crate::error::HandlerError;
use crate::event::Event;
use crate::hub::Hub;
use crate::message::MessageId;

/// What one call to [`ProjectionRegistry::handle`] did.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DispatchOutcome {
    /// A pending correlation was resolved by this event.
    pub correlated: bool,
    /// Denormalizers that handled the event.
    pub denormalized: usize,
    /// Denormalizers that failed on the event.
    pub failed: usize,
}

/// A `<model>:<id>` key naming one live entity instance.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EntityKey {
    pub model: String,
    pub id: MessageId,
}

impl EntityKey {
    pub fn new(model: impl Into<String>, id: impl Into<MessageId>) -> Self {
        Self {
            model: model.into(),
            id: id.into(),
        }
    }

    /// Split at the first `:`; both sides must be non-empty.
    pub fn parse(key: &str) -> Result<Self, RegistryError> {
        match key.split_once(':') {
            Some((model, id)) if !model.is_empty() && !id.is_empty() => {
                Ok(Self::new(model, id))
            }
            _ => Err(RegistryError::InvalidEntityKey(key.to_string())),
        }
    }
}

impl std::fmt::Display for EntityKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.model, self.id)
    }
}

/// A live entity's attachment to the change channels of its model's denormalizers.
///
/// Hand it back to [`ProjectionRegistry::unsubscribe_entity`] to detach.
#[derive(Debug)]
pub struct EntitySubscription {
    key: EntityKey,
    bindings: Vec<(Arc<Denormalizer>, SubscriptionId)>,
}

impl EntitySubscription {
    pub fn key(&self) -> &EntityKey {
        &self.key
    }

    /// How many denormalizers the entity listens to.
    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }
}

struct RegistryInner {
    gate: Arc<DispatchGate>,
    denormalizers: RwLock<Vec<Arc<Denormalizer>>>,
    correlations: Mutex<Correlations>,
}

/// Registry of denormalizers and of commands awaiting their events.
///
/// For every dispatched event it first resolves at most one pending
/// correlation, then hands the event to each denormalizer registered for the
/// event's name. Failures of individual callbacks or denormalizers are logged
/// and do not affect the others.
///
/// Cloning yields another handle to the same registry.
#[derive(Clone)]
pub struct ProjectionRegistry {
    inner: Arc<RegistryInner>,
}

impl Default for ProjectionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ProjectionRegistry {
    pub fn new() -> Self {
        Self::with_gate(Arc::new(DispatchGate::default()))
    }

    /// A registry whose mutations are serialized with the dispatch of the
    /// buses sharing `gate`.
    pub fn with_gate(gate: Arc<DispatchGate>) -> Self {
        Self {
            inner: Arc::new(RegistryInner {
                gate,
                denormalizers: RwLock::new(Vec::new()),
                correlations: Mutex::new(Correlations::default()),
            }),
        }
    }

    pub fn gate(&self) -> &Arc<DispatchGate> {
        &self.inner.gate
    }

    /// Subscribe [`ProjectionRegistry::handle`] to the hub's dispatch channel.
    pub fn attach(&self, hub: &Hub) -> Result<SubscriptionId, BusError> {
        let registry = self.clone();
        hub.on_dispatch(move |event| {
            registry.handle(event).map_err(HandlerError::other)?;
            Ok(())
        })
    }

    // -------------------------------------------------------------------------
    // Denormalizers
    // -------------------------------------------------------------------------

    /// Append a denormalizer. The same denormalizer registered twice receives
    /// every matching event twice.
    ///
    /// Prefer [`Denormalizer::register`], which also moves the denormalizer's
    /// change channels onto this registry's gate.
    pub fn register(&self, denormalizer: Arc<Denormalizer>) -> Result<(), RegistryError> {
        let _gate = self.inner.gate.enter()?;
        debug!(
            event = denormalizer.for_event(),
            model = denormalizer.for_model(),
            "registering denormalizer"
        );
        if !Arc::ptr_eq(denormalizer.change_gate(), &self.inner.gate) {
            warn!(
                event = denormalizer.for_event(),
                model = denormalizer.for_model(),
                "denormalizer publishes changes outside this registry's dispatch gate"
            );
        }
        self.inner
            .denormalizers
            .write()
            .map_err(|_| RegistryError::LockPoisoned("register"))?
            .push(denormalizer);
        Ok(())
    }

    /// Remove every registration of `denormalizer`. Returns how many were removed.
    pub fn unregister(&self, denormalizer: &Arc<Denormalizer>) -> Result<usize, RegistryError> {
        let _gate = self.inner.gate.enter()?;
        let mut denormalizers = self
            .inner
            .denormalizers
            .write()
            .map_err(|_| RegistryError::LockPoisoned("unregister"))?;
        let before = denormalizers.len();
        denormalizers.retain(|d| !Arc::ptr_eq(d, denormalizer));
        Ok(before - denormalizers.len())
    }

    pub fn find_by_event(&self, event_name: &str) -> Vec<Arc<Denormalizer>> {
        self.filter(|d| d.for_event() == event_name)
    }

    pub fn find_by_model(&self, model_name: &str) -> Vec<Arc<Denormalizer>> {
        self.filter(|d| d.for_model() == model_name)
    }

    pub fn len(&self) -> usize {
        self.inner
            .denormalizers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn filter(&self, predicate: impl Fn(&Denormalizer) -> bool) -> Vec<Arc<Denormalizer>> {
        self.inner
            .denormalizers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|d| predicate(d))
            .cloned()
            .collect()
    }

    // -------------------------------------------------------------------------
    // Dispatch
    // -------------------------------------------------------------------------

    /// Resolve the event's pending correlation (if any), then project it.
    pub fn handle(&self, event: &Event) -> Result<DispatchOutcome, RegistryError> {
        let _gate = self.inner.gate.enter()?;
        let mut outcome = DispatchOutcome::default();

        self.sweep_expired()?;

        if let Some(correlation_id) = &event.correlation_id {
            let pending = self
                .inner
                .correlations
                .lock()
                .map_err(|_| RegistryError::LockPoisoned("handle"))?
                .take_match(correlation_id);
            if let Some(pending) = pending {
                debug!(
                    command_id = %pending.command_id,
                    event = %event.name,
                    "resolved pending command"
                );
                let callback = pending.callback;
                match panic::catch_unwind(AssertUnwindSafe(move || callback(event))) {
                    Ok(()) => outcome.correlated = true,
                    Err(payload) => warn!(
                        command_id = %pending.command_id,
                        panic = panic_message(payload.as_ref()),
                        "command observer panicked"
                    ),
                }
            }
        }

        let denormalizers = self.find_by_event(&event.name);
        if denormalizers.is_empty() {
            debug!(event = %event.name, "no denormalizer registered");
        }
        for denormalizer in denormalizers {
            match panic::catch_unwind(AssertUnwindSafe(|| denormalizer.handle(event))) {
                Ok(Ok(())) => outcome.denormalized += 1,
                Ok(Err(err)) => {
                    warn!(
                        event = %event.name,
                        model = denormalizer.for_model(),
                        error = %err,
                        "denormalizer failed"
                    );
                    outcome.failed += 1;
                }
                Err(payload) => {
                    warn!(
                        event = %event.name,
                        model = denormalizer.for_model(),
                        panic = panic_message(payload.as_ref()),
                        "denormalizer panicked"
                    );
                    outcome.failed += 1;
                }
            }
        }

        Ok(outcome)
    }

    // -------------------------------------------------------------------------
    // Command correlation
    // -------------------------------------------------------------------------

    /// Run `callback` with the first event whose correlation id is `command_id`.
    ///
    /// The watch stays pending until such an event arrives or it is cancelled.
    pub fn observe<F>(
        &self,
        command_id: impl Into<MessageId>,
        callback: F,
    ) -> Result<ObservationId, RegistryError>
    where
        F: FnOnce(&Event) + Send + 'static,
    {
        self.push_observation(command_id.into(), Box::new(callback), None)
    }

    /// Like [`ProjectionRegistry::observe`], but the watch is dropped unanswered
    /// after `timeout`. Expiry is checked on each dispatch and on
    /// [`ProjectionRegistry::sweep_expired`].
    pub fn observe_with_timeout<F>(
        &self,
        command_id: impl Into<MessageId>,
        timeout: Duration,
        callback: F,
    ) -> Result<ObservationId, RegistryError>
    where
        F: FnOnce(&Event) + Send + 'static,
    {
        let deadline = Instant::now() + timeout;
        self.push_observation(command_id.into(), Box::new(callback), Some(deadline))
    }

    fn push_observation(
        &self,
        command_id: MessageId,
        callback: Box<dyn FnOnce(&Event) + Send>,
        expires_at: Option<Instant>,
    ) -> Result<ObservationId, RegistryError> {
        let _gate = self.inner.gate.enter()?;
        debug!(command_id = %command_id, timeout = expires_at.is_some(), "observing command");
        Ok(self
            .inner
            .correlations
            .lock()
            .map_err(|_| RegistryError::LockPoisoned("observe"))?
            .push(command_id, callback, expires_at))
    }

    /// Drop a pending watch. Returns whether it was still pending.
    pub fn cancel(&self, observation: ObservationId) -> Result<bool, RegistryError> {
        let _gate = self.inner.gate.enter()?;
        Ok(self
            .inner
            .correlations
            .lock()
            .map_err(|_| RegistryError::LockPoisoned("cancel"))?
            .cancel(observation))
    }

    /// Drop watches whose timeout elapsed. Returns how many were dropped.
    pub fn sweep_expired(&self) -> Result<usize, RegistryError> {
        let expired = self
            .inner
            .correlations
            .lock()
            .map_err(|_| RegistryError::LockPoisoned("sweep"))?
            .take_expired(Instant::now());
        for pending in &expired {
            warn!(command_id = %pending.command_id, "command observation expired unanswered");
        }
        Ok(expired.len())
    }

    pub fn pending_count(&self) -> usize {
        self.inner
            .correlations
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    // -------------------------------------------------------------------------
    // Entity subscriptions
    // -------------------------------------------------------------------------

    /// Attach `callback` to the `change:<id>` channel of every denormalizer of
    /// the key's model. `key` has the form `<model>:<id>`.
    ///
    /// Only denormalizers registered at this point are attached.
    pub fn subscribe_entity<F>(
        &self,
        key: &str,
        callback: F,
    ) -> Result<EntitySubscription, RegistryError>
    where
        F: Fn(&Value) -> Result<(), HandlerError> + Send + Sync + 'static,
    {
        let key = EntityKey::parse(key)?;
        let _gate = self.inner.gate.enter()?;
        let callback = Arc::new(callback);

        let mut bindings = Vec::new();
        for denormalizer in self.find_by_model(&key.model) {
            let callback = Arc::clone(&callback);
            let subscription = denormalizer.subscribe_changes(&key.id, move |data| callback(data))?;
            bindings.push((denormalizer, subscription));
        }

        debug!(key = %key, denormalizers = bindings.len(), "entity subscribed");
        Ok(EntitySubscription { key, bindings })
    }

    /// Detach an entity subscription. Returns how many change channels it left.
    pub fn unsubscribe_entity(
        &self,
        subscription: &EntitySubscription,
    ) -> Result<usize, RegistryError> {
        let _gate = self.inner.gate.enter()?;
        let mut removed = 0;
        for (denormalizer, id) in &subscription.bindings {
            if denormalizer.unsubscribe_changes(&subscription.key.id, *id)? {
                removed += 1;
            }
        }
        debug!(key = %subscription.key, removed, "entity unsubscribed");
        Ok(removed)
    }
}
