//! Identifiers and raw inbound messages.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Identifier of an entity instance or of a command awaiting its event.
///
/// Ids arrive as JSON strings or numbers; both are normalized to their string
/// form so that `7` and `"7"` name the same instance.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageId(String);

impl MessageId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Build an id from a resolved JSON value.
    ///
    /// Only strings and numbers carry an id; everything else yields `None`.
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::String(s) => Some(Self(s.clone())),
            Value::Number(n) => Some(Self(n.to_string())),
            _ => None,
        }
    }

    /// A fresh random id (UUID v4).
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for MessageId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for MessageId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl From<u64> for MessageId {
    fn from(id: u64) -> Self {
        Self(id.to_string())
    }
}

impl From<i64> for MessageId {
    fn from(id: i64) -> Self {
        Self(id.to_string())
    }
}

impl PartialEq<str> for MessageId {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

impl PartialEq<&str> for MessageId {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}

/// An inbound message as a transport delivers it, before parsing.
#[derive(Debug, Clone, PartialEq)]
pub enum RawMessage {
    /// A textual encoding, typically JSON.
    Text(String),
    /// Encoded bytes, typically UTF-8 JSON.
    Bytes(Vec<u8>),
    /// An already structured message.
    Structured(Value),
}

impl RawMessage {
    /// Default parsing: decode text and bytes as JSON, pass structured values through.
    pub fn to_value(&self) -> Result<Value, serde_json::Error> {
        match self {
            RawMessage::Text(text) => serde_json::from_str(text),
            RawMessage::Bytes(bytes) => serde_json::from_slice(bytes),
            RawMessage::Structured(value) => Ok(value.clone()),
        }
    }

    /// The message as text, if it is textual or valid UTF-8 bytes.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            RawMessage::Text(text) => Some(text),
            RawMessage::Bytes(bytes) => std::str::from_utf8(bytes).ok(),
            RawMessage::Structured(_) => None,
        }
    }
}

impl From<&str> for RawMessage {
    fn from(text: &str) -> Self {
        RawMessage::Text(text.to_string())
    }
}

impl From<String> for RawMessage {
    fn from(text: String) -> Self {
        RawMessage::Text(text)
    }
}

impl From<Vec<u8>> for RawMessage {
    fn from(bytes: Vec<u8>) -> Self {
        RawMessage::Bytes(bytes)
    }
}

impl From<Value> for RawMessage {
    fn from(value: Value) -> Self {
        RawMessage::Structured(value)
    }
}
