//! Channel Bus - synchronous named-channel publish/subscribe
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                 ChannelBus<T> (one per payload type)        │
//! │  - subscribe(channel, handler) -> SubscriptionId            │
//! │  - unsubscribe(channel, id) / unsubscribe_all(channel)      │
//! │  - publish(channel, &T) -> Delivery { delivered, failed }   │
//! └─────────────────────────────────────────────────────────────┘
//!                            │
//!                            ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                DispatchGate (shared per hub)                 │
//! │  - reentrant for the owning thread (nested publishes)       │
//! │  - other threads wait until the outermost publish returns   │
//! │  - bounds nesting depth                                     │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! Delivery is depth-first: a handler that publishes again sees its nested
//! publish complete before the outer publish moves on to the next handler.

mod channel_bus;
mod error;
mod gate;

pub use channel_bus::{ChannelBus, Delivery, Handler, SubscriptionId};
pub(crate) use channel_bus::panic_message;
pub use error::BusError;
pub use gate::{DispatchGate, GateGuard, DEFAULT_MAX_DEPTH};
