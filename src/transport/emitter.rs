use std::sync::{Arc, Mutex, PoisonError};

use event_emitter_rs::EventEmitter;
use tracing::{debug, warn};

use crate::bus::{BusError, SubscriptionId};
use crate::hub::Hub;

/// Forwards outbound commands to an [`EventEmitter`], keyed by command name.
///
/// Listeners receive the command's outbound form as JSON text on the
/// emitter's own threads, so they run after `Command::emit` has returned.
///
/// ```ignore
/// let bridge = EmitterBridge::new();
/// bridge.on("createPerson", |json| println!("to server: {json}"));
/// bridge.attach(router.hub())?;
/// ```
#[derive(Clone)]
pub struct EmitterBridge {
    emitter: Arc<Mutex<EventEmitter>>,
}

impl Default for EmitterBridge {
    fn default() -> Self {
        Self::new()
    }
}

impl EmitterBridge {
    pub fn new() -> Self {
        Self::with_emitter(EventEmitter::new())
    }

    pub fn with_emitter(emitter: EventEmitter) -> Self {
        Self {
            emitter: Arc::new(Mutex::new(emitter)),
        }
    }

    /// Register a listener for commands named `command`. Returns the
    /// emitter's listener id.
    pub fn on<F>(&self, command: &str, listener: F) -> String
    where
        F: Fn(String) + Send + Sync + 'static,
    {
        self.emitter().on(command, listener)
    }

    pub fn remove_listener(&self, listener_id: &str) -> bool {
        self.emitter().remove_listener(listener_id).is_some()
    }

    /// Subscribe the bridge to the hub's commands channel.
    pub fn attach(&self, hub: &Hub) -> Result<SubscriptionId, BusError> {
        let bridge = self.clone();
        hub.on_commands(move |command| {
            let Some(name) = command.get("name").and_then(|name| name.as_str()) else {
                warn!("command without a name, not forwarded to emitter");
                return Ok(());
            };
            let json = serde_json::to_string(command)?;
            debug!(command = name, "forwarding command to emitter");
            let _ = bridge.emitter().emit(name, json);
            Ok(())
        })
    }

    fn emitter(&self) -> std::sync::MutexGuard<'_, EventEmitter> {
        self.emitter.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
