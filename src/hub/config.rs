//! Routing hub configuration.
//!
//! `HubConfig` is built fluently or deserialized from JSON using the option
//! names routing configs are usually written with:
//!
//! ```
//! use cqrs_hub::HubConfig;
//!
//! let config = HubConfig::from_json(r#"{
//!     "eventsChannel": "inbound",
//!     "eventNamePath": "eventName",
//!     "correlationIdPath": "meta.commandId"
//! }"#).unwrap();
//!
//! assert_eq!(config.events_channel, "inbound");
//! assert_eq!(config.commands_channel, "commands");
//! assert_eq!(config.event_entity_id_path.to_string(), "payload.id");
//! ```

use std::fmt;
use std::sync::Arc;

use serde::Deserialize;
use serde_json::Value;

use crate::bus::DEFAULT_MAX_DEPTH;
use crate::error::HandlerError;
use crate::message::{MessageId, RawMessage};
use crate::path::FieldPath;

/// Turns a raw inbound message into a structured body.
pub type ParseMessageFn = dyn Fn(&RawMessage) -> Result<Value, HandlerError> + Send + Sync;

/// Extracts the correlation id from a parsed body, given the configured path.
pub type ExtractCorrelationIdFn = dyn Fn(&Value, &FieldPath) -> Option<MessageId> + Send + Sync;

/// Name of the internal channel carrying normalized events.
pub const DISPATCH_CHANNEL: &str = "dispatchEvent";

#[derive(Clone, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct HubConfig {
    /// Channel emitted commands are published on.
    pub commands_channel: String,
    /// Channel transports deliver raw inbound events on.
    pub events_channel: String,
    /// Path of the event type inside a parsed message.
    pub event_name_path: FieldPath,
    /// Path of the target entity id inside a parsed message.
    pub event_entity_id_path: FieldPath,
    /// Path of the answered command's id inside a parsed message.
    pub correlation_id_path: FieldPath,
    /// Bound on nested publishes per thread.
    pub max_publish_depth: usize,
    #[serde(skip)]
    parse_message: Option<Arc<ParseMessageFn>>,
    #[serde(skip)]
    extract_correlation_id: Option<Arc<ExtractCorrelationIdFn>>,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            commands_channel: "commands".to_string(),
            events_channel: "events".to_string(),
            event_name_path: FieldPath::parse("name"),
            event_entity_id_path: FieldPath::parse("payload.id"),
            correlation_id_path: FieldPath::parse("commandId"),
            max_publish_depth: DEFAULT_MAX_DEPTH,
            parse_message: None,
            extract_correlation_id: None,
        }
    }
}

impl fmt::Debug for HubConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HubConfig")
            .field("commands_channel", &self.commands_channel)
            .field("events_channel", &self.events_channel)
            .field("event_name_path", &self.event_name_path.to_string())
            .field("event_entity_id_path", &self.event_entity_id_path.to_string())
            .field("correlation_id_path", &self.correlation_id_path.to_string())
            .field("max_publish_depth", &self.max_publish_depth)
            .field("custom_parse_message", &self.parse_message.is_some())
            .field(
                "custom_extract_correlation_id",
                &self.extract_correlation_id.is_some(),
            )
            .finish()
    }
}

impl HubConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Deserialize from JSON; absent keys keep their defaults.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn commands_channel(mut self, channel: impl Into<String>) -> Self {
        self.commands_channel = channel.into();
        self
    }

    pub fn events_channel(mut self, channel: impl Into<String>) -> Self {
        self.events_channel = channel.into();
        self
    }

    pub fn event_name_path(mut self, path: impl Into<FieldPath>) -> Self {
        self.event_name_path = path.into();
        self
    }

    pub fn event_entity_id_path(mut self, path: impl Into<FieldPath>) -> Self {
        self.event_entity_id_path = path.into();
        self
    }

    pub fn correlation_id_path(mut self, path: impl Into<FieldPath>) -> Self {
        self.correlation_id_path = path.into();
        self
    }

    pub fn max_publish_depth(mut self, depth: usize) -> Self {
        self.max_publish_depth = depth;
        self
    }

    /// Replace the default message parser (JSON for text and bytes, passthrough otherwise).
    pub fn parse_message<F>(mut self, parse: F) -> Self
    where
        F: Fn(&RawMessage) -> Result<Value, HandlerError> + Send + Sync + 'static,
    {
        self.parse_message = Some(Arc::new(parse));
        self
    }

    /// Replace the default correlation id lookup (path resolution).
    pub fn extract_correlation_id<F>(mut self, extract: F) -> Self
    where
        F: Fn(&Value, &FieldPath) -> Option<MessageId> + Send + Sync + 'static,
    {
        self.extract_correlation_id = Some(Arc::new(extract));
        self
    }

    /// Parse a raw message with the configured or default parser.
    pub fn parse(&self, raw: &RawMessage) -> Result<Value, HandlerError> {
        match &self.parse_message {
            Some(parse) => parse(raw),
            None => raw
                .to_value()
                .map_err(|e| HandlerError::Malformed(e.to_string())),
        }
    }

    /// Correlation id of a parsed body, via the configured hook or the path.
    pub fn correlation_id(&self, body: &Value) -> Option<MessageId> {
        match &self.extract_correlation_id {
            Some(extract) => extract(body, &self.correlation_id_path),
            None => self
                .correlation_id_path
                .resolve(body)
                .and_then(MessageId::from_value),
        }
    }
}
