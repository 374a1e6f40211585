//! Router - a hub and its projection registry, wired together.

use std::sync::{Arc, OnceLock};

use tracing::{debug, error};

use crate::bus::BusError;
use crate::hub::{Hub, HubConfig};
use crate::registry::{ProjectionRegistry, RegistryError};

/// A [`Hub`] with a [`ProjectionRegistry`] attached to its dispatch channel.
///
/// Both share the hub's dispatch gate, so registrations made from one thread
/// never interleave with a dispatch running on another.
///
/// `Router::new` builds an independent pair (one per test, say); the
/// process-wide router is reached through [`global`] and [`init`].
#[derive(Clone)]
pub struct Router {
    hub: Hub,
    registry: ProjectionRegistry,
}

impl Default for Router {
    fn default() -> Self {
        Self::new()
    }
}

impl Router {
    pub fn new() -> Self {
        let hub = Hub::new();
        let registry = ProjectionRegistry::with_gate(Arc::clone(hub.gate()));
        if let Err(err) = registry.attach(&hub) {
            error!(error = %err, "failed to attach projection registry");
        }
        Self { hub, registry }
    }

    /// Initialize the hub; only the first call has any effect.
    pub fn init(&self, config: HubConfig) -> Result<bool, BusError> {
        self.hub.init(config)
    }

    pub fn hub(&self) -> &Hub {
        &self.hub
    }

    pub fn registry(&self) -> &ProjectionRegistry {
        &self.registry
    }

    /// Drop command observations whose timeout elapsed.
    pub fn sweep_expired(&self) -> Result<usize, RegistryError> {
        self.registry.sweep_expired()
    }
}

static GLOBAL: OnceLock<Router> = OnceLock::new();

/// The process-wide router, created uninitialized on first use.
pub fn global() -> &'static Router {
    GLOBAL.get_or_init(|| {
        debug!("creating process-wide router");
        Router::new()
    })
}

/// Initialize the process-wide router with `config` and return it.
///
/// The first initialization wins; later configurations are ignored with a
/// warning.
pub fn init(config: HubConfig) -> Result<&'static Router, BusError> {
    let router = global();
    router.init(config)?;
    Ok(router)
}
