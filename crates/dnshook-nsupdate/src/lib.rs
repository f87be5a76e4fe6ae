// # nsupdate Updater
//
// Applies update scripts by piping them into BIND's `nsupdate` utility.
//
// ## Invocation
//
// ```text
// nsupdate -v [-k <key_file>]  < script
// ```
//
// `-v` forces TCP so multi-operation scripts are never truncated. The TSIG
// key is referenced by path only; its contents are never read or logged
// by this crate.
//
// ## Behavior
//
// - One process per script, no retries
// - Exit status 0 → success
// - Non-zero exit → `Error::Updater` with the server's rcode translated
//   (REFUSED, NOTAUTH, SERVFAIL, NOTZONE, FORMERR, NXDOMAIN), otherwise the
//   raw stderr
//
// ## Dry-Run Mode
//
// With `DNSHOOK_MODE=dry-run` the factory builds an updater that logs each
// script and skips the process entirely.

use std::process::Stdio;
use std::time::Instant;

use async_trait::async_trait;
use dnshook_core::config::UpdaterConfig;
use dnshook_core::traits::{UpdateRequest, Updater, UpdaterFactory};
use dnshook_core::{Error, Result};
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, info, warn};

/// Updater name used in errors and logs
const UPDATER_NAME: &str = "nsupdate";

/// nsupdate-backed updater
#[derive(Debug, Clone)]
pub struct NsupdateUpdater {
    /// Binary to execute
    binary: String,

    /// Key file used when the request carries no key reference
    key_file: Option<String>,

    /// Log scripts instead of running the binary
    dry_run: bool,
}

impl NsupdateUpdater {
    /// Create a new nsupdate updater
    ///
    /// # Parameters
    ///
    /// - `binary`: Path or name of the `nsupdate` executable
    /// - `key_file`: TSIG key file passed with `-k`
    /// - `dry_run`: If true, log scripts without executing anything
    pub fn new(binary: impl Into<String>, key_file: Option<String>, dry_run: bool) -> Self {
        Self {
            binary: binary.into(),
            key_file,
            dry_run,
        }
    }

    /// Binary this updater runs
    pub fn binary(&self) -> &str {
        &self.binary
    }

    /// Whether this updater only logs scripts
    pub fn is_dry_run(&self) -> bool {
        self.dry_run
    }

    fn command(&self, key_file: Option<&str>) -> Command {
        let mut cmd = Command::new(&self.binary);
        cmd.arg("-v");
        if let Some(key_file) = key_file {
            cmd.arg("-k").arg(key_file);
        }
        cmd.stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        cmd
    }

    async fn execute(&self, request: &UpdateRequest) -> Result<()> {
        let start = Instant::now();
        let key_file = request.key_ref.as_deref().or(self.key_file.as_deref());

        let mut child = self.command(key_file).spawn().map_err(|e| {
            Error::updater(
                UPDATER_NAME,
                format!("failed to spawn {}: {}", self.binary, e),
            )
        })?;

        // A write failure usually means the process already exited; its
        // stderr below explains why
        let write_error = match child.stdin.take() {
            Some(mut stdin) => {
                let written = async {
                    stdin.write_all(request.script.as_bytes()).await?;
                    stdin.shutdown().await
                };
                written.await.err()
            }
            None => None,
        };

        let output = child.wait_with_output().await.map_err(|e| {
            Error::updater(UPDATER_NAME, format!("failed to wait for {}: {}", self.binary, e))
        })?;

        let elapsed_ms = start.elapsed().as_millis() as u64;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let message = parse_nsupdate_error(&stderr);
            return Err(Error::updater(
                UPDATER_NAME,
                format!("{} ({}, {} ms)", message, output.status, elapsed_ms),
            ));
        }

        if let Some(e) = write_error {
            return Err(Error::updater(
                UPDATER_NAME,
                format!("failed to write script to {}: {}", self.binary, e),
            ));
        }

        debug!(server = %request.server, elapsed_ms, "nsupdate completed");
        Ok(())
    }
}

#[async_trait]
impl Updater for NsupdateUpdater {
    async fn apply(&self, request: &UpdateRequest) -> Result<()> {
        if self.dry_run {
            info!(
                server = %request.server,
                script = %request.script,
                "[DRY-RUN] Would run nsupdate"
            );
            return Ok(());
        }

        self.execute(request).await
    }

    fn updater_name(&self) -> &'static str {
        UPDATER_NAME
    }
}

/// Translate nsupdate's stderr into a human-readable reason
pub fn parse_nsupdate_error(stderr: &str) -> String {
    if stderr.contains("REFUSED") {
        "Zone refused the update (check allow-update configuration)".to_string()
    } else if stderr.contains("NOTAUTH") {
        "Not authorized (check TSIG key configuration)".to_string()
    } else if stderr.contains("SERVFAIL") {
        "Server failure (check nameserver logs)".to_string()
    } else if stderr.contains("NOTZONE") {
        "Zone not found on server".to_string()
    } else if stderr.contains("FORMERR") {
        "Format error (check record syntax)".to_string()
    } else if stderr.contains("NXDOMAIN") {
        "Domain name does not exist".to_string()
    } else if stderr.trim().is_empty() {
        "nsupdate exited without diagnostics".to_string()
    } else {
        stderr.trim().to_string()
    }
}

/// Factory for nsupdate updaters
pub struct NsupdateFactory;

impl UpdaterFactory for NsupdateFactory {
    fn create(&self, config: &UpdaterConfig) -> Result<Box<dyn Updater>> {
        match config {
            UpdaterConfig::Nsupdate { binary, key_file } => {
                if binary.is_empty() {
                    return Err(Error::config("nsupdate binary is required"));
                }

                // Check for dry-run mode environment variable
                let dry_run = std::env::var("DNSHOOK_MODE")
                    .unwrap_or_default()
                    .eq_ignore_ascii_case("dry-run");

                if dry_run {
                    warn!("nsupdate updater running in DRY-RUN mode - no changes will be made");
                }

                Ok(Box::new(NsupdateUpdater::new(
                    binary.clone(),
                    key_file.clone(),
                    dry_run,
                )))
            }
            _ => Err(Error::config("Invalid config for nsupdate updater")),
        }
    }
}

/// Register the nsupdate updater with a registry
///
/// # Example
///
/// ```rust
/// use dnshook_core::UpdaterRegistry;
///
/// let registry = UpdaterRegistry::new();
/// dnshook_nsupdate::register(&registry);
/// assert!(registry.has_updater("nsupdate"));
/// ```
pub fn register(registry: &dnshook_core::UpdaterRegistry) {
    registry.register_updater(UPDATER_NAME, Box::new(NsupdateFactory));
}

#[cfg(test)]
mod tests {
    use super::*;
    use dnshook_core::ServerAddress;

    fn request(script: &str) -> UpdateRequest {
        UpdateRequest::new(script, ServerAddress::default(), None)
    }

    #[test]
    fn test_error_translation() {
        assert_eq!(
            parse_nsupdate_error("update failed: REFUSED\n"),
            "Zone refused the update (check allow-update configuration)"
        );
        assert_eq!(
            parse_nsupdate_error("; TSIG error with server: tsig verify failure\nupdate failed: NOTAUTH"),
            "Not authorized (check TSIG key configuration)"
        );
        assert_eq!(parse_nsupdate_error("update failed: NOTZONE"), "Zone not found on server");
        assert_eq!(
            parse_nsupdate_error("  could not read key from /etc/nsupdate.key\n"),
            "could not read key from /etc/nsupdate.key"
        );
        assert_eq!(parse_nsupdate_error(""), "nsupdate exited without diagnostics");
    }

    #[test]
    fn test_factory_creation() {
        let updater = NsupdateFactory.create(&UpdaterConfig::default()).unwrap();
        assert_eq!(updater.updater_name(), "nsupdate");

        let config = UpdaterConfig::Nsupdate {
            binary: String::new(),
            key_file: None,
        };
        assert!(NsupdateFactory.create(&config).is_err());
        assert!(NsupdateFactory.create(&UpdaterConfig::DryRun).is_err());
    }

    #[test]
    fn test_register() {
        let registry = dnshook_core::UpdaterRegistry::with_builtin();
        register(&registry);
        assert!(registry.has_updater("nsupdate"));
        assert!(registry.create_updater(&UpdaterConfig::default()).is_ok());
    }

    #[tokio::test]
    async fn test_dry_run_skips_process() {
        let updater = NsupdateUpdater::new("/nonexistent/nsupdate", None, true);
        assert!(updater.is_dry_run());
        updater.apply(&request("server 127.0.0.1 53\nsend\n")).await.unwrap();
    }

    #[tokio::test]
    async fn test_missing_binary_is_updater_error() {
        let updater = NsupdateUpdater::new("/nonexistent/nsupdate", None, false);
        let err = updater
            .apply(&request("server 127.0.0.1 53\nsend\n"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Updater { ref updater, .. } if updater == "nsupdate"));
        assert!(err.to_string().contains("failed to spawn"));
    }

    #[cfg(unix)]
    mod process {
        use super::*;
        use std::os::unix::fs::PermissionsExt;
        use std::path::{Path, PathBuf};

        /// Write an executable shell script standing in for nsupdate
        fn fake_nsupdate(dir: &Path, body: &str) -> PathBuf {
            let path = dir.join("nsupdate");
            std::fs::write(&path, format!("#!/bin/sh\n{}\n", body)).unwrap();
            std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
            path
        }

        #[tokio::test]
        async fn test_script_is_piped_with_key_file() {
            let dir = tempfile::tempdir().unwrap();
            let args = dir.path().join("args");
            let stdin = dir.path().join("stdin");
            let binary = fake_nsupdate(
                dir.path(),
                &format!("echo \"$@\" > {}\ncat > {}", args.display(), stdin.display()),
            );

            let updater = NsupdateUpdater::new(binary.display().to_string(), None, false);
            let script = "server 127.0.0.1 53\nupdate add a.example.com. 300 IN A 10.0.0.1\nsend\n";
            let request = UpdateRequest::new(
                script,
                ServerAddress::default(),
                Some("/etc/nsupdate.key".into()),
            );
            updater.apply(&request).await.unwrap();

            assert_eq!(
                std::fs::read_to_string(&args).unwrap().trim(),
                "-v -k /etc/nsupdate.key"
            );
            assert_eq!(std::fs::read_to_string(&stdin).unwrap(), script);
        }

        #[tokio::test]
        async fn test_configured_key_file_is_the_fallback() {
            let dir = tempfile::tempdir().unwrap();
            let args = dir.path().join("args");
            let binary = fake_nsupdate(
                dir.path(),
                &format!("echo \"$@\" > {}\ncat > /dev/null", args.display()),
            );

            let updater = NsupdateUpdater::new(
                binary.display().to_string(),
                Some("/run/keys/ddns.key".into()),
                false,
            );
            updater.apply(&request("send\n")).await.unwrap();

            assert_eq!(
                std::fs::read_to_string(&args).unwrap().trim(),
                "-v -k /run/keys/ddns.key"
            );
        }

        #[tokio::test]
        async fn test_non_zero_exit_maps_stderr() {
            let dir = tempfile::tempdir().unwrap();
            let binary = fake_nsupdate(
                dir.path(),
                "cat > /dev/null\necho 'update failed: REFUSED' >&2\nexit 2",
            );

            let updater = NsupdateUpdater::new(binary.display().to_string(), None, false);
            let err = updater.apply(&request("send\n")).await.unwrap_err();

            let message = err.to_string();
            assert!(message.starts_with("Updater error (nsupdate): Zone refused the update"));
        }
    }
}
