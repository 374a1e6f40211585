//! Projection Registry - event fan-out, command correlation, entity subscriptions
//!
//! ```text
//! dispatchEvent ──► ProjectionRegistry::handle(event)
//!                     │
//!                     ├─ 1. first pending watch with correlation id == event.correlation_id
//!                     │     (consumed, callback runs once)
//!                     │
//!                     └─ 2. every Denormalizer with for_event == event.name
//!                           └─► change:<id> ──► entity subscriptions ("model:id")
//! ```

mod correlation;
mod error;
mod registry;

pub use correlation::{CorrelationCallback, ObservationId};
pub use error::RegistryError;
pub use registry::{DispatchOutcome, EntityKey, EntitySubscription, ProjectionRegistry};
