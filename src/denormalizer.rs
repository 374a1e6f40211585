//! Denormalizers - projection logic for one event type and one model type.
//!
//! The default behavior turns an event into a change notification for one
//! entity instance: extract the event's projection payload, then publish it on
//! the instance's `change:<id>` channel where live models merge it.
//!
//! Both steps are replaceable without subclassing:
//!
//! - `on_handle` replaces the whole handling, e.g. a creation event building a
//!   new model and inserting it into a collection;
//! - `on_apply` replaces only the last step, e.g. a deletion event removing the
//!   target instance instead of merging data into it.
//!
//! ```
//! use cqrs_hub::{Denormalizer, ProjectionRegistry};
//!
//! let registry = ProjectionRegistry::new();
//! let changed = Denormalizer::new("personChanged", "person")
//!     .register(&registry)
//!     .unwrap();
//!
//! assert_eq!(changed.for_event(), "personChanged");
//! assert_eq!(registry.find_by_model("person").len(), 1);
//! ```

use std::fmt;
use std::sync::Arc;

use serde_json::Value;
use tracing::trace;

use crate::bus::{BusError, ChannelBus, Delivery, DispatchGate, SubscriptionId};
use crate::error::HandlerError;
use crate::event::Event;
use crate::message::MessageId;
use crate::path::FieldPath;
use crate::registry::{ProjectionRegistry, RegistryError};

/// Replacement for [`Denormalizer::handle`].
pub type HandleFn = dyn Fn(&Denormalizer, &Event) -> Result<(), HandlerError> + Send + Sync;

/// Replacement for [`Denormalizer::apply`].
pub type ApplyFn =
    dyn Fn(&Denormalizer, Value, &ApplyTarget<'_>) -> Result<(), HandlerError> + Send + Sync;

const DEFAULT_PAYLOAD_PATH: &str = "payload";

pub struct Denormalizer {
    for_event: String,
    for_model: String,
    payload_path: Option<FieldPath>,
    changes: ChannelBus<Value>,
    handle: Option<Arc<HandleFn>>,
    apply: Option<Arc<ApplyFn>>,
}

impl fmt::Debug for Denormalizer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Denormalizer")
            .field("for_event", &self.for_event)
            .field("for_model", &self.for_model)
            .field("payload_path", &self.payload_path.as_ref().map(|p| p.to_string()))
            .field("custom_handle", &self.handle.is_some())
            .field("custom_apply", &self.apply.is_some())
            .finish()
    }
}

impl Denormalizer {
    pub fn new(for_event: impl Into<String>, for_model: impl Into<String>) -> Self {
        Self {
            for_event: for_event.into(),
            for_model: for_model.into(),
            payload_path: Some(FieldPath::parse(DEFAULT_PAYLOAD_PATH)),
            changes: ChannelBus::new(),
            handle: None,
            apply: None,
        }
    }

    /// Replace the default handling of an event.
    pub fn on_handle<F>(mut self, handle: F) -> Self
    where
        F: Fn(&Denormalizer, &Event) -> Result<(), HandlerError> + Send + Sync + 'static,
    {
        self.handle = Some(Arc::new(handle));
        self
    }

    /// Replace the default application of extracted data to the target instance.
    pub fn on_apply<F>(mut self, apply: F) -> Self
    where
        F: Fn(&Denormalizer, Value, &ApplyTarget<'_>) -> Result<(), HandlerError>
            + Send
            + Sync
            + 'static,
    {
        self.apply = Some(Arc::new(apply));
        self
    }

    /// Path of the projected data inside the event body (default `payload`).
    pub fn payload_path(mut self, path: impl Into<FieldPath>) -> Self {
        self.payload_path = Some(path.into());
        self
    }

    /// Project the whole event body instead of a sub-path.
    pub fn whole_event(mut self) -> Self {
        self.payload_path = None;
        self
    }

    /// Add this denormalizer to `registry` and return the shared handle.
    ///
    /// Both `for_event` and `for_model` must be non-empty. From here on change
    /// publishes go through the registry's dispatch gate, with its depth limit,
    /// and change subscriptions made before registering are kept.
    pub fn register(mut self, registry: &ProjectionRegistry) -> Result<Arc<Self>, RegistryError> {
        if self.for_event.is_empty() || self.for_model.is_empty() {
            return Err(RegistryError::Unbound {
                for_event: self.for_event,
                for_model: self.for_model,
            });
        }
        self.changes = std::mem::take(&mut self.changes).into_gate(Arc::clone(registry.gate()));
        let denormalizer = Arc::new(self);
        registry.register(Arc::clone(&denormalizer))?;
        Ok(denormalizer)
    }

    pub fn for_event(&self) -> &str {
        &self.for_event
    }

    pub fn for_model(&self) -> &str {
        &self.for_model
    }

    /// Handle an event: the `on_handle` override if set, the default otherwise.
    pub fn handle(&self, event: &Event) -> Result<(), HandlerError> {
        match &self.handle {
            Some(handle) => handle(self, event),
            None => self.default_handle(event),
        }
    }

    /// Events without an entity id are skipped; others are extracted and applied.
    pub fn default_handle(&self, event: &Event) -> Result<(), HandlerError> {
        let Some(id) = &event.id else {
            trace!(event = %event.name, model = %self.for_model, "event has no entity id, skipping");
            return Ok(());
        };
        let data = self.extract(event);
        self.apply(data, &ApplyTarget::new(self, id))
    }

    /// The projected data of `event`: its payload path, or the whole body.
    pub fn extract(&self, event: &Event) -> Value {
        match &self.payload_path {
            Some(path) => path.resolve(&event.payload).cloned().unwrap_or(Value::Null),
            None => event.payload.clone(),
        }
    }

    /// Apply data to the target: the `on_apply` override if set, the default otherwise.
    pub fn apply(&self, data: Value, target: &ApplyTarget<'_>) -> Result<(), HandlerError> {
        match &self.apply {
            Some(apply) => apply(self, data, target),
            None => self.default_apply(data, target),
        }
    }

    /// Publish `data` on the target instance's change channel.
    pub fn default_apply(&self, data: Value, target: &ApplyTarget<'_>) -> Result<(), HandlerError> {
        target.publish(&data)?;
        Ok(())
    }

    /// Name of the change channel for one instance.
    pub fn change_channel(id: &MessageId) -> String {
        format!("change:{id}")
    }

    /// Listen for projected changes of one instance.
    pub fn subscribe_changes<F>(
        &self,
        instance_id: &MessageId,
        handler: F,
    ) -> Result<SubscriptionId, BusError>
    where
        F: Fn(&Value) -> Result<(), HandlerError> + Send + Sync + 'static,
    {
        self.changes
            .subscribe(&Self::change_channel(instance_id), handler)
    }

    pub fn unsubscribe_changes(
        &self,
        instance_id: &MessageId,
        subscription: SubscriptionId,
    ) -> Result<bool, BusError> {
        self.changes
            .unsubscribe(&Self::change_channel(instance_id), subscription)
    }

    /// Gate serializing change publishes; the registry's once registered.
    pub fn change_gate(&self) -> &Arc<DispatchGate> {
        self.changes.gate()
    }

    pub fn change_subscribers(&self, instance_id: &MessageId) -> usize {
        self.changes
            .subscriber_count(&Self::change_channel(instance_id))
    }

    fn publish_change(&self, channel: &str, data: &Value) -> Result<Delivery, BusError> {
        self.changes.publish(channel, data)
    }
}

/// The entity instance an [`Denormalizer::apply`] call targets.
pub struct ApplyTarget<'a> {
    denormalizer: &'a Denormalizer,
    id: &'a MessageId,
    channel: String,
}

impl<'a> ApplyTarget<'a> {
    pub fn new(denormalizer: &'a Denormalizer, id: &'a MessageId) -> Self {
        Self {
            denormalizer,
            id,
            channel: Denormalizer::change_channel(id),
        }
    }

    pub fn id(&self) -> &MessageId {
        self.id
    }

    /// The `change:<id>` channel name.
    pub fn channel(&self) -> &str {
        &self.channel
    }

    pub fn model(&self) -> &str {
        self.denormalizer.for_model()
    }

    /// Notify subscribers of this instance.
    pub fn publish(&self, data: &Value) -> Result<Delivery, BusError> {
        self.denormalizer.publish_change(&self.channel, data)
    }
}
