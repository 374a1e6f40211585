use thiserror::Error;

use crate::bus::BusError;

/// Failure reported by a bus subscriber, a denormalizer or an entity callback.
///
/// Handler failures are isolated: the bus logs them and keeps delivering to
/// the remaining subscribers.
#[derive(Debug, Error)]
pub enum HandlerError {
    /// The message could not be turned into a structured value.
    #[error("malformed message: {0}")]
    Malformed(String),
    /// JSON decoding or re-encoding failed.
    #[error("decode failed: {0}")]
    Decode(#[from] serde_json::Error),
    /// The handler refused the message.
    #[error("rejected: {0}")]
    Rejected(String),
    /// A nested publish failed.
    #[error("bus error: {0}")]
    Bus(#[from] BusError),
    /// Other error.
    #[error("handler error: {0}")]
    Other(Box<dyn std::error::Error + Send + Sync>),
}

impl HandlerError {
    pub fn other(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        HandlerError::Other(Box::new(err))
    }
}
