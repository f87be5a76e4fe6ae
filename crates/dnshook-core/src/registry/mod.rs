//! Plugin-based updater registry
//!
//! The registry maps updater type names to factories so the daemon can
//! build whichever updater the configuration names without hardcoded
//! if-else chains.
//!
//! ## Registration
//!
//! Updater crates register themselves during initialization:
//!
//! ```rust,ignore
//! // In the dnshook-nsupdate crate
//! pub fn register(registry: &UpdaterRegistry) {
//!     registry.register_updater("nsupdate", Box::new(NsupdateFactory));
//! }
//! ```
//!
//! The dry-run updater is registered by [`UpdaterRegistry::with_builtin`].

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use crate::config::UpdaterConfig;
use crate::error::{Error, Result};
use crate::traits::{Updater, UpdaterFactory};
use crate::updater::DryRunFactory;

/// Updater registry for plugin-based updater creation
///
/// ## Thread Safety
///
/// Interior mutability with RwLock: concurrent lookups, exclusive writes.
#[derive(Default)]
pub struct UpdaterRegistry {
    updaters: RwLock<HashMap<String, Box<dyn UpdaterFactory>>>,
}

impl UpdaterRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry with the built-in `dry_run` updater registered
    pub fn with_builtin() -> Self {
        let registry = Self::new();
        registry.register_updater("dry_run", Box::new(DryRunFactory));
        registry
    }

    /// Register an updater factory under `name`, replacing any previous one
    pub fn register_updater(&self, name: impl Into<String>, factory: Box<dyn UpdaterFactory>) {
        let mut updaters = self.updaters.write().unwrap_or_else(PoisonError::into_inner);
        updaters.insert(name.into(), factory);
    }

    /// Create an updater from configuration
    ///
    /// # Returns
    ///
    /// - `Ok(Arc<dyn Updater>)`: Shareable updater instance
    /// - `Err(Error::Config)`: Type not registered, or the factory rejected the config
    pub fn create_updater(&self, config: &UpdaterConfig) -> Result<Arc<dyn Updater>> {
        let updater_type = config.type_name();
        let updaters = self.updaters.read().unwrap_or_else(PoisonError::into_inner);

        let factory = updaters
            .get(updater_type)
            .ok_or_else(|| Error::config(format!("Unknown updater type: {}", updater_type)))?;

        factory.create(config).map(Arc::from)
    }

    /// List all registered updater types
    pub fn list_updaters(&self) -> Vec<String> {
        let updaters = self.updaters.read().unwrap_or_else(PoisonError::into_inner);
        updaters.keys().cloned().collect()
    }

    /// Check if an updater type is registered
    pub fn has_updater(&self, name: &str) -> bool {
        let updaters = self.updaters.read().unwrap_or_else(PoisonError::into_inner);
        updaters.contains_key(name)
    }
}
