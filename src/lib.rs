extern crate self as cqrs_hub;

mod bus;
mod command;
mod denormalizer;
mod error;
mod event;
mod hub;
mod message;
mod model;
mod path;
mod registry;
mod router;
mod transport;

pub use bus::{
    BusError, ChannelBus, Delivery, DispatchGate, GateGuard, Handler, SubscriptionId,
    DEFAULT_MAX_DEPTH,
};
pub use command::{Command, CommandParseFn};
pub use denormalizer::{ApplyFn, ApplyTarget, Denormalizer, HandleFn};
pub use error::HandlerError;
pub use event::Event;
pub use hub::{ExtractCorrelationIdFn, Hub, HubConfig, ParseMessageFn, WeakHub, DISPATCH_CHANNEL};
pub use message::{MessageId, RawMessage};
pub use model::{merge_fields, Live, LiveModel, ModelCollection};
pub use path::{resolve, FieldPath};
pub use registry::{
    CorrelationCallback, DispatchOutcome, EntityKey, EntitySubscription, ObservationId,
    ProjectionRegistry, RegistryError,
};
pub use router::{global, init, Router};
pub use transport::Loopback;

#[cfg(feature = "emitter")]
pub use transport::EmitterBridge;

// Re-export the derive macro next to the trait it implements
pub use cqrs_hub_macros::LiveModel;
