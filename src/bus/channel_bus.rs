//! Named-channel publish/subscribe with synchronous, ordered delivery.

use std::any::Any;
use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use tracing::{error, trace, warn};

use super::gate::DispatchGate;
use super::BusError;
use crate::error::HandlerError;

/// A subscriber callback for messages of type `T`.
pub type Handler<T> = dyn Fn(&T) -> Result<(), HandlerError> + Send + Sync;

static NEXT_SUBSCRIPTION: AtomicU64 = AtomicU64::new(1);

/// Identifies one subscription; used to unsubscribe it again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(u64);

impl SubscriptionId {
    fn next() -> Self {
        Self(NEXT_SUBSCRIPTION.fetch_add(1, Ordering::Relaxed))
    }

    pub fn get(&self) -> u64 {
        self.0
    }
}

/// Outcome of one publish.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Delivery {
    /// Subscribers that handled the message.
    pub delivered: usize,
    /// Subscribers that returned an error or panicked.
    pub failed: usize,
}

impl Delivery {
    /// True when no subscriber was reached at all.
    pub fn is_empty(&self) -> bool {
        self.delivered == 0 && self.failed == 0
    }

    pub fn merge(&mut self, other: Delivery) {
        self.delivered += other.delivered;
        self.failed += other.failed;
    }
}

struct Subscription<T> {
    id: SubscriptionId,
    handler: Arc<Handler<T>>,
}

/// Channel bus carrying messages of type `T`.
///
/// - `publish` invokes every handler subscribed to the channel, in
///   subscription order, before returning.
/// - Handlers may publish, subscribe or unsubscribe while being invoked; a
///   nested publish runs to completion before the outer one continues.
/// - A handler that fails (error or panic) is logged and counted; the
///   remaining handlers still run.
/// - Publishing to a channel nobody listens on is a no-op.
///
/// ## Example
///
/// ```
/// use cqrs_hub::ChannelBus;
/// use std::sync::{Arc, Mutex};
///
/// let bus: ChannelBus<String> = ChannelBus::new();
/// let seen = Arc::new(Mutex::new(Vec::new()));
///
/// let sink = Arc::clone(&seen);
/// let id = bus.subscribe("greetings", move |msg: &String| {
///     sink.lock().unwrap().push(msg.clone());
///     Ok(())
/// }).unwrap();
///
/// bus.publish("greetings", &"hello".to_string()).unwrap();
/// bus.unsubscribe("greetings", id).unwrap();
/// bus.publish("greetings", &"ignored".to_string()).unwrap();
///
/// assert_eq!(*seen.lock().unwrap(), vec!["hello".to_string()]);
/// ```
pub struct ChannelBus<T> {
    channels: RwLock<HashMap<String, Vec<Subscription<T>>>>,
    gate: Arc<DispatchGate>,
}

impl<T> Default for ChannelBus<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> ChannelBus<T> {
    /// A bus with its own dispatch gate.
    pub fn new() -> Self {
        Self::with_gate(Arc::new(DispatchGate::default()))
    }

    /// A bus sharing `gate` with other buses, so their dispatch is serialized together.
    pub fn with_gate(gate: Arc<DispatchGate>) -> Self {
        Self {
            channels: RwLock::new(HashMap::new()),
            gate,
        }
    }

    pub fn gate(&self) -> &Arc<DispatchGate> {
        &self.gate
    }

    /// Move this bus, subscriptions included, onto `gate`.
    pub fn into_gate(self, gate: Arc<DispatchGate>) -> Self {
        Self { gate, ..self }
    }

    /// Register `handler` for `channel`, after any existing handlers.
    pub fn subscribe<F>(&self, channel: &str, handler: F) -> Result<SubscriptionId, BusError>
    where
        F: Fn(&T) -> Result<(), HandlerError> + Send + Sync + 'static,
    {
        let _gate = self.gate.enter()?;
        let id = SubscriptionId::next();
        let mut channels = self
            .channels
            .write()
            .map_err(|_| BusError::LockPoisoned("subscribe"))?;
        channels
            .entry(channel.to_string())
            .or_default()
            .push(Subscription {
                id,
                handler: Arc::new(handler),
            });
        trace!(channel, subscription = id.0, "subscribed");
        Ok(id)
    }

    /// Remove one subscription. Returns whether it was found on `channel`.
    pub fn unsubscribe(&self, channel: &str, id: SubscriptionId) -> Result<bool, BusError> {
        let _gate = self.gate.enter()?;
        let mut channels = self
            .channels
            .write()
            .map_err(|_| BusError::LockPoisoned("unsubscribe"))?;
        let Some(subscriptions) = channels.get_mut(channel) else {
            return Ok(false);
        };
        let before = subscriptions.len();
        subscriptions.retain(|sub| sub.id != id);
        let removed = subscriptions.len() != before;
        if subscriptions.is_empty() {
            channels.remove(channel);
        }
        Ok(removed)
    }

    /// Remove every subscription on `channel`. Returns how many were removed.
    pub fn unsubscribe_all(&self, channel: &str) -> Result<usize, BusError> {
        let _gate = self.gate.enter()?;
        let mut channels = self
            .channels
            .write()
            .map_err(|_| BusError::LockPoisoned("unsubscribe"))?;
        Ok(channels.remove(channel).map_or(0, |subs| subs.len()))
    }

    /// Re-home every subscription on `from` to the end of `to`, keeping their
    /// order and ids. Returns how many moved.
    pub fn move_channel(&self, from: &str, to: &str) -> Result<usize, BusError> {
        let _gate = self.gate.enter()?;
        if from == to {
            return Ok(0);
        }
        let mut channels = self
            .channels
            .write()
            .map_err(|_| BusError::LockPoisoned("move channel"))?;
        let Some(moved) = channels.remove(from) else {
            return Ok(0);
        };
        let count = moved.len();
        channels.entry(to.to_string()).or_default().extend(moved);
        trace!(from, to, count, "channel subscriptions moved");
        Ok(count)
    }

    pub fn subscriber_count(&self, channel: &str) -> usize {
        self.channels
            .read()
            .map(|channels| channels.get(channel).map_or(0, Vec::len))
            .unwrap_or(0)
    }

    /// Channels that currently have at least one subscriber.
    pub fn channels(&self) -> Vec<String> {
        self.channels
            .read()
            .map(|channels| channels.keys().cloned().collect())
            .unwrap_or_default()
    }

    /// Deliver `message` to every handler on `channel`.
    pub fn publish(&self, channel: &str, message: &T) -> Result<Delivery, BusError> {
        let guard = self.gate.enter()?;
        if guard.exceeds_limit() {
            error!(
                channel,
                depth = guard.depth(),
                "nested publish chain too deep, dropping message"
            );
            return Err(BusError::DepthExceeded {
                channel: channel.to_string(),
                depth: guard.depth(),
            });
        }

        // Snapshot so handlers can (un)subscribe while we iterate.
        let handlers: Vec<(SubscriptionId, Arc<Handler<T>>)> = {
            let channels = self
                .channels
                .read()
                .map_err(|_| BusError::LockPoisoned("publish"))?;
            match channels.get(channel) {
                Some(subs) => subs
                    .iter()
                    .map(|sub| (sub.id, Arc::clone(&sub.handler)))
                    .collect(),
                None => Vec::new(),
            }
        };

        let mut delivery = Delivery::default();
        for (id, handler) in handlers {
            match panic::catch_unwind(AssertUnwindSafe(|| handler(message))) {
                Ok(Ok(())) => delivery.delivered += 1,
                Ok(Err(err)) => {
                    warn!(channel, subscription = id.0, error = %err, "subscriber failed");
                    delivery.failed += 1;
                }
                Err(payload) => {
                    warn!(
                        channel,
                        subscription = id.0,
                        panic = panic_message(payload.as_ref()),
                        "subscriber panicked"
                    );
                    delivery.failed += 1;
                }
            }
        }
        Ok(delivery)
    }
}

pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        msg
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.as_str()
    } else {
        "non-string panic payload"
    }
}
