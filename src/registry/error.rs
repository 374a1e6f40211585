//! Error types for the projection registry.

use thiserror::Error;

use crate::bus::BusError;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    /// Entity keys have the form `<model>:<id>`.
    #[error("invalid entity key {0:?}, expected <model>:<id>")]
    InvalidEntityKey(String),
    /// Live instances are subscribed under their id, which must not be empty.
    #[error("{model} instance has an empty id and cannot be bound")]
    MissingEntityId { model: String },
    /// A denormalizer must name both the event and the model it projects.
    #[error("denormalizer is unbound (event {for_event:?}, model {for_model:?})")]
    Unbound { for_event: String, for_model: String },
    /// Only commands with an id can be correlated with their events.
    #[error("command has no id to correlate on")]
    MissingCommandId,
    #[error("registry lock poisoned during {0}")]
    LockPoisoned(&'static str),
    #[error(transparent)]
    Bus(#[from] BusError),
}
