//! Outbound commands.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::debug;

use crate::bus::{BusError, Delivery};
use crate::event::Event;
use crate::hub::Hub;
use crate::message::MessageId;
use crate::registry::{ObservationId, ProjectionRegistry, RegistryError};

/// Transforms a command's serialized form right before it is published.
pub type CommandParseFn = dyn Fn(Value) -> Value + Send + Sync;

/// A request to change state, routed out through the hub's commands channel.
///
/// ```
/// use cqrs_hub::{Command, Router};
/// use serde_json::json;
/// use std::sync::{Arc, Mutex};
///
/// let router = Router::new();
/// router.init(Default::default()).unwrap();
///
/// let answered = Arc::new(Mutex::new(None));
/// let cmd = Command::new("createPerson", json!({ "personname": "Tim" })).with_id("cmd-1");
///
/// let slot = Arc::clone(&answered);
/// cmd.observe(router.registry(), move |event| {
///     *slot.lock().unwrap() = Some(event.name.clone());
/// }).unwrap();
/// cmd.emit(router.hub()).unwrap();
///
/// // a transport answers later
/// router.hub().deliver(json!({ "name": "personCreated", "commandId": "cmd-1" })).unwrap();
/// assert_eq!(answered.lock().unwrap().as_deref(), Some("personCreated"));
/// ```
#[derive(Clone, Serialize, Deserialize)]
pub struct Command {
    /// Correlation key; events answering this command carry it back.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<MessageId>,
    pub name: String,
    #[serde(default)]
    pub payload: Value,
    #[serde(skip)]
    parse: Option<Arc<CommandParseFn>>,
}

impl fmt::Debug for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Command")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("payload", &self.payload)
            .field("custom_parse", &self.parse.is_some())
            .finish()
    }
}

impl PartialEq for Command {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id && self.name == other.name && self.payload == other.payload
    }
}

impl Command {
    pub fn new(name: impl Into<String>, payload: Value) -> Self {
        Self {
            id: None,
            name: name.into(),
            payload,
            parse: None,
        }
    }

    pub fn with_id(mut self, id: impl Into<MessageId>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Assign a freshly generated id.
    pub fn with_new_id(self) -> Self {
        self.with_id(MessageId::generate())
    }

    /// Transform the serialized command before it is published (identity by default).
    pub fn with_parse<F>(mut self, parse: F) -> Self
    where
        F: Fn(Value) -> Value + Send + Sync + 'static,
    {
        self.parse = Some(Arc::new(parse));
        self
    }

    /// The command's serialized form: `{ "id"?, "name", "payload" }`.
    pub fn to_value(&self) -> Value {
        let mut map = Map::new();
        if let Some(id) = &self.id {
            map.insert("id".to_string(), Value::String(id.to_string()));
        }
        map.insert("name".to_string(), Value::String(self.name.clone()));
        map.insert("payload".to_string(), self.payload.clone());
        Value::Object(map)
    }

    /// The form published on the bus, after the parse hook.
    pub fn outbound(&self) -> Value {
        let data = self.to_value();
        match &self.parse {
            Some(parse) => parse(data),
            None => data,
        }
    }

    /// Publish this command on the hub's commands channel.
    pub fn emit(&self, hub: &Hub) -> Result<Delivery, BusError> {
        debug!(command = %self.name, id = ?self.id.as_ref().map(MessageId::as_str), "emitting command");
        hub.publish_command(&self.outbound())
    }

    /// Wait for the first event answering this command.
    ///
    /// Register before [`Command::emit`] so a synchronous responder cannot
    /// answer before anyone is listening. Without an id there is nothing to
    /// correlate on and `RegistryError::MissingCommandId` is returned.
    pub fn observe<F>(
        &self,
        registry: &ProjectionRegistry,
        callback: F,
    ) -> Result<ObservationId, RegistryError>
    where
        F: FnOnce(&Event) + Send + 'static,
    {
        let id = self.id.clone().ok_or(RegistryError::MissingCommandId)?;
        registry.observe(id, callback)
    }

    /// Like [`Command::observe`], but the watch is dropped once `timeout` has passed.
    pub fn observe_with_timeout<F>(
        &self,
        registry: &ProjectionRegistry,
        timeout: Duration,
        callback: F,
    ) -> Result<ObservationId, RegistryError>
    where
        F: FnOnce(&Event) + Send + 'static,
    {
        let id = self.id.clone().ok_or(RegistryError::MissingCommandId)?;
        registry.observe_with_timeout(id, timeout, callback)
    }
}
