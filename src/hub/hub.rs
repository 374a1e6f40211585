//! The routing hub: inbound normalization and outbound command channel.

use std::sync::{Arc, OnceLock, Weak};

use serde_json::Value;
use tracing::{debug, error, warn};

use super::config::{HubConfig, DISPATCH_CHANNEL};
use crate::bus::{BusError, ChannelBus, Delivery, DispatchGate, SubscriptionId};
use crate::error::HandlerError;
use crate::event::Event;
use crate::message::{MessageId, RawMessage};

struct HubInner {
    gate: Arc<DispatchGate>,
    messages: ChannelBus<RawMessage>,
    commands: ChannelBus<Value>,
    dispatch: ChannelBus<Event>,
    config: OnceLock<Arc<HubConfig>>,
    defaults: Arc<HubConfig>,
}

/// Non-owning [`Hub`] handle.
#[derive(Clone)]
pub struct WeakHub(Weak<HubInner>);

impl WeakHub {
    pub fn upgrade(&self) -> Option<Hub> {
        self.0.upgrade().map(|inner| Hub { inner })
    }
}

/// Routing hub.
///
/// Owns three typed buses sharing one dispatch gate:
///
/// - raw messages, keyed by channel name (the configured events channel is
///   where transports deliver inbound events),
/// - outbound commands in their serialized form,
/// - normalized [`Event`]s on the internal dispatch channel.
///
/// Cloning a `Hub` yields another handle to the same hub.
///
/// ## Example
///
/// ```
/// use cqrs_hub::{Hub, HubConfig};
/// use std::sync::{Arc, Mutex};
///
/// let hub = Hub::new();
/// hub.init(HubConfig::default()).unwrap();
///
/// let names = Arc::new(Mutex::new(Vec::new()));
/// let sink = Arc::clone(&names);
/// hub.on_dispatch(move |event| {
///     sink.lock().unwrap().push(event.name.clone());
///     Ok(())
/// }).unwrap();
///
/// hub.deliver(r#"{"name":"personCreated","payload":{"id":"p1"}}"#).unwrap();
/// assert_eq!(*names.lock().unwrap(), vec!["personCreated".to_string()]);
/// ```
#[derive(Clone)]
pub struct Hub {
    inner: Arc<HubInner>,
}

impl Default for Hub {
    fn default() -> Self {
        Self::new()
    }
}

impl Hub {
    /// An uninitialized hub using default channel names until [`Hub::init`] runs.
    pub fn new() -> Self {
        let gate = Arc::new(DispatchGate::default());
        Self {
            inner: Arc::new(HubInner {
                messages: ChannelBus::with_gate(Arc::clone(&gate)),
                commands: ChannelBus::with_gate(Arc::clone(&gate)),
                dispatch: ChannelBus::with_gate(Arc::clone(&gate)),
                gate,
                config: OnceLock::new(),
                defaults: Arc::new(HubConfig::default()),
            }),
        }
    }

    /// Apply `config` and start normalizing the events channel.
    ///
    /// Only the first call has any effect; later calls return `Ok(false)` and
    /// leave the routing policy untouched. Command subscribers registered
    /// before this call follow the configured commands channel. The
    /// configuration is committed only once the events channel subscription
    /// is in place, so a failed call leaves the hub uninitialized.
    pub fn init(&self, config: HubConfig) -> Result<bool, BusError> {
        // Serialized with every subscribe and publish on this hub.
        let _gate = self.inner.gate.enter()?;
        if let Some(active) = self.inner.config.get() {
            warn!(
                events_channel = %config.events_channel,
                active_events_channel = %active.events_channel,
                "hub already initialized, ignoring new configuration"
            );
            return Ok(false);
        }
        let config = Arc::new(config);

        let weak = self.downgrade();
        let normalizer = self
            .inner
            .messages
            .subscribe(&config.events_channel, move |raw: &RawMessage| {
                match weak.upgrade() {
                    Some(hub) => hub.route(raw),
                    None => Ok(()),
                }
            })
            .map_err(|err| {
                error!(
                    events_channel = %config.events_channel,
                    error = %err,
                    "hub initialization failed, configuration not applied"
                );
                err
            })?;

        if let Err(err) = self
            .inner
            .commands
            .move_channel(&self.inner.defaults.commands_channel, &config.commands_channel)
        {
            error!(
                commands_channel = %config.commands_channel,
                error = %err,
                "hub initialization failed, configuration not applied"
            );
            let _ = self
                .inner
                .messages
                .unsubscribe(&config.events_channel, normalizer);
            return Err(err);
        }

        if self.inner.config.set(Arc::clone(&config)).is_err() {
            // lost a race with another init
            let _ = self
                .inner
                .messages
                .unsubscribe(&config.events_channel, normalizer);
            return Ok(false);
        }
        self.inner.gate.set_max_depth(config.max_publish_depth);

        debug!(
            commands_channel = %config.commands_channel,
            events_channel = %config.events_channel,
            event_name_path = %config.event_name_path,
            event_entity_id_path = %config.event_entity_id_path,
            correlation_id_path = %config.correlation_id_path,
            "hub initialized"
        );
        Ok(true)
    }

    pub fn is_initialized(&self) -> bool {
        self.inner.config.get().is_some()
    }

    /// The active configuration, or the defaults before initialization.
    pub fn config(&self) -> &HubConfig {
        self.inner
            .config
            .get()
            .unwrap_or(&self.inner.defaults)
            .as_ref()
    }

    pub fn gate(&self) -> &Arc<DispatchGate> {
        &self.inner.gate
    }

    /// A handle that does not keep the hub alive, for subscribers stored on
    /// the hub's own buses.
    pub fn downgrade(&self) -> WeakHub {
        WeakHub(Arc::downgrade(&self.inner))
    }

    /// Parse a raw message and extract name, entity id and correlation id.
    pub fn normalize(&self, raw: &RawMessage) -> Result<Event, HandlerError> {
        let config = self.config();
        let body = config.parse(raw)?;

        let name = match config.event_name_path.resolve(&body) {
            Some(Value::String(name)) => name.clone(),
            Some(Value::Number(n)) => n.to_string(),
            _ => String::new(),
        };
        let id = config
            .event_entity_id_path
            .resolve(&body)
            .and_then(MessageId::from_value);
        let correlation_id = config.correlation_id(&body);

        Ok(Event {
            name,
            id,
            correlation_id,
            payload: body,
        })
    }

    fn route(&self, raw: &RawMessage) -> Result<(), HandlerError> {
        let event = self.normalize(raw)?;
        if event.name.is_empty() {
            debug!(
                path = %self.config().event_name_path,
                "inbound event has no name"
            );
        }
        debug!(
            event = %event.name,
            id = ?event.id.as_ref().map(MessageId::as_str),
            correlation_id = ?event.correlation_id.as_ref().map(MessageId::as_str),
            "dispatching event"
        );
        self.inner.dispatch.publish(DISPATCH_CHANNEL, &event)?;
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Raw message channels
    // -------------------------------------------------------------------------

    /// Deliver an inbound event on the configured events channel.
    pub fn deliver(&self, raw: impl Into<RawMessage>) -> Result<Delivery, BusError> {
        let channel = self.config().events_channel.clone();
        self.publish_message(&channel, raw)
    }

    pub fn publish_message(
        &self,
        channel: &str,
        raw: impl Into<RawMessage>,
    ) -> Result<Delivery, BusError> {
        self.inner.messages.publish(channel, &raw.into())
    }

    pub fn on_message<F>(&self, channel: &str, handler: F) -> Result<SubscriptionId, BusError>
    where
        F: Fn(&RawMessage) -> Result<(), HandlerError> + Send + Sync + 'static,
    {
        self.inner.messages.subscribe(channel, handler)
    }

    pub fn unsubscribe_message(&self, channel: &str, id: SubscriptionId) -> Result<bool, BusError> {
        self.inner.messages.unsubscribe(channel, id)
    }

    // -------------------------------------------------------------------------
    // Commands channel
    // -------------------------------------------------------------------------

    /// Publish a serialized command on the configured commands channel.
    pub fn publish_command(&self, command: &Value) -> Result<Delivery, BusError> {
        let _gate = self.inner.gate.enter()?;
        let channel = &self.config().commands_channel;
        let delivery = self.inner.commands.publish(channel, command)?;
        if delivery.is_empty() {
            debug!(channel = %channel, "command emitted with no transport listening");
        }
        Ok(delivery)
    }

    /// Subscribe a transport to outbound commands.
    ///
    /// May be called before [`Hub::init`]; the subscription moves to the
    /// configured commands channel when the hub is initialized.
    pub fn on_commands<F>(&self, handler: F) -> Result<SubscriptionId, BusError>
    where
        F: Fn(&Value) -> Result<(), HandlerError> + Send + Sync + 'static,
    {
        let _gate = self.inner.gate.enter()?;
        let channel = &self.config().commands_channel;
        self.inner.commands.subscribe(channel, handler)
    }

    pub fn unsubscribe_commands(&self, id: SubscriptionId) -> Result<bool, BusError> {
        let _gate = self.inner.gate.enter()?;
        let channel = &self.config().commands_channel;
        self.inner.commands.unsubscribe(channel, id)
    }

    // -------------------------------------------------------------------------
    // Dispatch channel
    // -------------------------------------------------------------------------

    /// Publish an already normalized event to dispatch subscribers.
    pub fn dispatch(&self, event: &Event) -> Result<Delivery, BusError> {
        self.inner.dispatch.publish(DISPATCH_CHANNEL, event)
    }

    pub fn on_dispatch<F>(&self, handler: F) -> Result<SubscriptionId, BusError>
    where
        F: Fn(&Event) -> Result<(), HandlerError> + Send + Sync + 'static,
    {
        self.inner.dispatch.subscribe(DISPATCH_CHANNEL, handler)
    }

    pub fn unsubscribe_dispatch(&self, id: SubscriptionId) -> Result<bool, BusError> {
        self.inner.dispatch.unsubscribe(DISPATCH_CHANNEL, id)
    }
}
