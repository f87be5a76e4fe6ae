// # Updater Trait
//
// Defines the interface for submitting dynamic-update scripts to an
// authoritative nameserver.
//
// ## Implementations
//
// - nsupdate: `dnshook-nsupdate` crate
// - Dry run: `crate::updater::DryRunUpdater`
//
// ## Usage
//
// ```rust,ignore
// use dnshook_core::traits::{UpdateRequest, Updater};
//
// let request = UpdateRequest::new(script, server, Some("/etc/nsupdate.key".into()));
// updater.apply(&request).await?;
// ```

use async_trait::async_trait;

use crate::config::{ServerAddress, UpdaterConfig};

/// One script submission
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateRequest {
    /// Full script text, `server` line through `send`
    pub script: String,
    /// Server the script addresses
    pub server: ServerAddress,
    /// Reference to the TSIG key material (a key file path), never the key itself
    pub key_ref: Option<String>,
}

impl UpdateRequest {
    /// Create a new request
    pub fn new(script: impl Into<String>, server: ServerAddress, key_ref: Option<String>) -> Self {
        Self {
            script: script.into(),
            server,
            key_ref,
        }
    }
}

/// Trait for update script executors
///
/// An updater applies exactly one script per call and reports success or
/// failure. It holds no locks and makes no ordering decisions: callers
/// already hold the lock for every name the script touches.
///
/// # Trust Level: Untrusted
///
/// ## Allowed Capabilities
/// - Contact the server named in the request
/// - Read the key material referenced by the request
///
/// ## Forbidden Capabilities
/// - Retrying failed submissions (failures are terminal for the event)
/// - Spawning tasks that outlive the call
/// - Logging key contents
#[async_trait]
pub trait Updater: Send + Sync {
    /// Submit the script and wait for the server's verdict
    ///
    /// # Returns
    ///
    /// - `Ok(())`: Every operation in the script was accepted
    /// - `Err(Error::Updater)`: The script was rejected, partly or wholly
    async fn apply(&self, request: &UpdateRequest) -> Result<(), crate::Error>;

    /// Get the updater name (for logging/debugging)
    fn updater_name(&self) -> &'static str;
}

/// Helper trait for constructing updaters from configuration
pub trait UpdaterFactory: Send + Sync {
    /// Create an Updater instance from configuration
    fn create(&self, config: &UpdaterConfig) -> Result<Box<dyn Updater>, crate::Error>;
}
