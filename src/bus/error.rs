//! Error types for channel bus operations.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BusError {
    /// An internal lock was poisoned by a panicking thread.
    #[error("bus lock poisoned during {0}")]
    LockPoisoned(&'static str),
    /// A chain of nested publishes went deeper than the configured limit.
    #[error("nested publish on channel {channel} exceeded depth {depth}")]
    DepthExceeded { channel: String, depth: usize },
}
