// # Dry-Run Updater
//
// Updater that logs each script instead of contacting a server.
//
// ## Modes
//
// - `logging_only()`: what `DryRunFactory` builds for the daemon. Scripts
//   go to the log and nothing is retained, so memory stays flat however
//   long the daemon runs.
// - `new()`: additionally records every request for later inspection.
//   Recorded requests are never evicted; meant for tests and short-lived
//   tooling.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::info;

use crate::config::UpdaterConfig;
use crate::traits::{UpdateRequest, Updater, UpdaterFactory};
use crate::Error;

/// Dry-run updater
///
/// Clones share the same recorded history.
#[derive(Debug, Clone)]
pub struct DryRunUpdater {
    /// `None` when the updater only logs
    applied: Option<Arc<RwLock<Vec<UpdateRequest>>>>,
}

impl DryRunUpdater {
    /// Create a recording updater with an empty history
    pub fn new() -> Self {
        Self {
            applied: Some(Arc::new(RwLock::new(Vec::new()))),
        }
    }

    /// Create an updater that logs scripts and keeps nothing
    pub fn logging_only() -> Self {
        Self { applied: None }
    }

    /// Whether applied requests are kept
    pub fn is_recording(&self) -> bool {
        self.applied.is_some()
    }

    /// Every request recorded so far, in arrival order
    pub async fn requests(&self) -> Vec<UpdateRequest> {
        match &self.applied {
            Some(applied) => applied.read().await.clone(),
            None => Vec::new(),
        }
    }

    /// Scripts recorded so far, in arrival order
    pub async fn scripts(&self) -> Vec<String> {
        self.requests()
            .await
            .into_iter()
            .map(|request| request.script)
            .collect()
    }

    /// Number of requests recorded so far
    pub async fn len(&self) -> usize {
        match &self.applied {
            Some(applied) => applied.read().await.len(),
            None => 0,
        }
    }

    /// Whether nothing has been recorded
    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

impl Default for DryRunUpdater {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Updater for DryRunUpdater {
    async fn apply(&self, request: &UpdateRequest) -> Result<(), Error> {
        info!(
            server = %request.server,
            script = %request.script,
            "Dry run: update script not submitted"
        );
        if let Some(applied) = &self.applied {
            applied.write().await.push(request.clone());
        }
        Ok(())
    }

    fn updater_name(&self) -> &'static str {
        "dry_run"
    }
}

/// Factory for [`DryRunUpdater`]
#[derive(Debug, Clone, Copy, Default)]
pub struct DryRunFactory;

impl UpdaterFactory for DryRunFactory {
    fn create(&self, config: &UpdaterConfig) -> Result<Box<dyn Updater>, Error> {
        match config {
            UpdaterConfig::DryRun => Ok(Box::new(DryRunUpdater::logging_only())),
            other => Err(Error::config(format!(
                "Dry-run factory cannot build a '{}' updater",
                other.type_name()
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ServerAddress;

    #[tokio::test]
    async fn test_dry_run_records_requests() {
        let updater = DryRunUpdater::new();
        assert!(updater.is_empty().await);

        let request = UpdateRequest::new(
            "server 127.0.0.1 53\nsend\n",
            ServerAddress::default(),
            None,
        );
        updater.apply(&request).await.unwrap();

        let observer = updater.clone();
        assert_eq!(observer.len().await, 1);
        assert_eq!(observer.requests().await, vec![request]);
        assert_eq!(observer.scripts().await[0], "server 127.0.0.1 53\nsend\n");
    }

    #[tokio::test]
    async fn test_logging_only_retains_nothing() {
        let updater = DryRunUpdater::logging_only();
        assert!(!updater.is_recording());

        for i in 0..1000 {
            let request = UpdateRequest::new(
                format!("server 127.0.0.1 53\nupdate add n{}.example.com. 300 IN A 10.0.0.1\nsend\n", i),
                ServerAddress::default(),
                None,
            );
            updater.apply(&request).await.unwrap();
        }

        assert_eq!(updater.len().await, 0);
        assert!(updater.requests().await.is_empty());
    }

    #[tokio::test]
    async fn test_factory_builds_logging_only_updater() {
        let updater = DryRunFactory.create(&UpdaterConfig::DryRun).unwrap();
        let request = UpdateRequest::new("send\n", ServerAddress::default(), None);
        updater.apply(&request).await.unwrap();
        assert_eq!(updater.updater_name(), "dry_run");
    }

    #[test]
    fn test_factory_rejects_other_configs() {
        assert!(DryRunFactory.create(&UpdaterConfig::DryRun).is_ok());
        assert!(DryRunFactory.create(&UpdaterConfig::default()).is_err());
    }
}
