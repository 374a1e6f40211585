//! Transport adapters at the hub boundary.
//!
//! The hub does not carry anything over the wire itself: a transport listens
//! on the commands channel and delivers whatever comes back on the events
//! channel. Two in-process adapters live here:
//!
//! - [`Loopback`] answers each command synchronously with an event built by a
//!   user function, standing in for a remote command processor.
//! - [`EmitterBridge`] (feature `emitter`) forwards each command as JSON text
//!   to an `event_emitter_rs::EventEmitter`, keyed by command name.

#[cfg(feature = "emitter")]
mod emitter;
mod loopback;

#[cfg(feature = "emitter")]
pub use emitter::EmitterBridge;
pub use loopback::Loopback;
