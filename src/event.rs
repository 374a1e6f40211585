//! Normalized inbound events.

use serde_json::Value;

use crate::message::MessageId;
use crate::path::FieldPath;

/// An event as the hub hands it to projections.
///
/// Built from a parsed inbound message: `name`, `id` and `correlation_id` are
/// extracted through the hub's configured paths, `payload` keeps the full
/// parsed body so projections can reach any field.
#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    /// Event type, e.g. `personCreated`. Empty when the name path found nothing.
    pub name: String,
    /// Target entity instance, if the message carries one.
    pub id: Option<MessageId>,
    /// Id of the command this event answers, if any.
    pub correlation_id: Option<MessageId>,
    /// The full parsed message.
    pub payload: Value,
}

impl Event {
    pub fn new(name: impl Into<String>, payload: Value) -> Self {
        Self {
            name: name.into(),
            id: None,
            correlation_id: None,
            payload,
        }
    }

    pub fn with_id(mut self, id: impl Into<MessageId>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_correlation_id(mut self, id: impl Into<MessageId>) -> Self {
        self.correlation_id = Some(id.into());
        self
    }

    /// Look up a dotted path inside the full message body.
    pub fn get(&self, path: &str) -> Option<&Value> {
        FieldPath::parse(path).resolve(&self.payload)
    }

    /// Look up a pre-parsed path inside the full message body.
    pub fn get_path(&self, path: &FieldPath) -> Option<&Value> {
        path.resolve(&self.payload)
    }

    /// Whether this event answers the command with `command_id`.
    pub fn answers(&self, command_id: &MessageId) -> bool {
        self.correlation_id.as_ref() == Some(command_id)
    }
}
