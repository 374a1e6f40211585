//! Routing Hub - inbound event normalization and outbound commands
//!
//! ```text
//! transport ──► events channel ──► parse ──► extract name / id / correlation id
//!                                                   │
//!                                                   ▼
//!                                    dispatchEvent channel ──► projections
//!
//! Command::emit ──► commands channel ──► transport
//! ```

mod config;
mod hub;

pub use config::{ExtractCorrelationIdFn, HubConfig, ParseMessageFn, DISPATCH_CHANNEL};
pub use hub::{Hub, WeakHub};
