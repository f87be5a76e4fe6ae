//! Daemon configuration
//!
//! Values come from `DNSHOOK_*` environment variables first. A JSON config
//! file, when present, overrides whatever it sets.

use std::env;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use dnshook_core::{HookConfig, ServerAddress, UpdaterConfig};
use serde::Deserialize;
use tracing::Level;

use crate::logging::{self, LogFormat};

/// Address the webhook listener binds when nothing is configured
pub const DEFAULT_LISTEN_ADDRESS: &str = "0.0.0.0:8080";

/// Config file picked up from the working directory
pub const DEFAULT_CONFIG_FILE: &str = "config.json";

/// Everything the daemon needs to start
#[derive(Debug, Clone)]
pub struct DaemonConfig {
    /// Socket address of the HTTP listener
    pub listen_address: String,

    /// Orchestrator settings
    pub hook: HookConfig,

    /// Log level name
    pub log_level: String,

    /// Log output format
    pub log_format: LogFormat,

    /// Config file that was applied, if any
    pub config_file: Option<PathBuf>,
}

/// Config file shape; every key is optional
#[derive(Debug, Default, Deserialize)]
struct FileConfig {
    listen_address: Option<String>,
    #[serde(alias = "bind_server_address")]
    server_address: Option<ServerAddress>,
    tsig_key_file: Option<String>,
    nsupdate_binary: Option<String>,
    log_level: Option<String>,
    log_format: Option<String>,
    declare_zone: Option<bool>,
    default_ttl: Option<u32>,
    event_channel_capacity: Option<usize>,
    updater: Option<UpdaterConfig>,
}

impl DaemonConfig {
    /// Load configuration from the process environment
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut hook = HookConfig::new();

        if let Some(server) = lookup("DNSHOOK_SERVER_ADDRESS") {
            hook.server = ServerAddress::parse(&server)
                .with_context(|| format!("DNSHOOK_SERVER_ADDRESS '{}' is invalid", server))?;
        }

        if let Some(updater_type) = lookup("DNSHOOK_UPDATER_TYPE") {
            hook.updater = match updater_type.to_lowercase().as_str() {
                "nsupdate" => UpdaterConfig::default(),
                "dry_run" | "dry-run" => UpdaterConfig::DryRun,
                _ => anyhow::bail!(
                    "DNSHOOK_UPDATER_TYPE '{}' is not supported. \
                    Supported types: nsupdate, dry_run",
                    updater_type
                ),
            };
        }

        set_nsupdate_options(
            &mut hook.updater,
            lookup("DNSHOOK_NSUPDATE_BINARY"),
            lookup("DNSHOOK_TSIG_KEY_FILE"),
        );

        if let Some(declare_zone) = lookup("DNSHOOK_DECLARE_ZONE") {
            hook.declare_zone = parse_bool("DNSHOOK_DECLARE_ZONE", &declare_zone)?;
        }

        if let Some(ttl) = lookup("DNSHOOK_DEFAULT_TTL") {
            hook.default_ttl = ttl
                .trim()
                .parse()
                .with_context(|| format!("DNSHOOK_DEFAULT_TTL '{}' is not a number", ttl))?;
        }

        let log_format = match lookup("DNSHOOK_LOG_FORMAT") {
            Some(format) => format.parse()?,
            None => LogFormat::Text,
        };

        let mut config = Self {
            listen_address: lookup("DNSHOOK_LISTEN_ADDRESS")
                .unwrap_or_else(|| DEFAULT_LISTEN_ADDRESS.to_string()),
            hook,
            log_level: lookup("DNSHOOK_LOG_LEVEL").unwrap_or_else(|| "info".to_string()),
            log_format,
            config_file: None,
        };

        let config_file = match lookup("DNSHOOK_CONFIG_FILE") {
            Some(path) => Some(PathBuf::from(path)),
            None => Some(PathBuf::from(DEFAULT_CONFIG_FILE)).filter(|p| p.exists()),
        };

        if let Some(path) = config_file {
            config.apply_file(&path)?;
        }

        config.listen_address = normalize_listen_address(&config.listen_address);
        Ok(config)
    }

    /// Overlay the keys set in a JSON config file
    fn apply_file(&mut self, path: &Path) -> Result<()> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let file: FileConfig = serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;

        if let Some(listen_address) = file.listen_address {
            self.listen_address = listen_address;
        }
        if let Some(server) = file.server_address {
            self.hook.server = server;
        }
        if let Some(updater) = file.updater {
            self.hook.updater = updater;
        }
        set_nsupdate_options(&mut self.hook.updater, file.nsupdate_binary, file.tsig_key_file);

        if let Some(declare_zone) = file.declare_zone {
            self.hook.declare_zone = declare_zone;
        }
        if let Some(ttl) = file.default_ttl {
            self.hook.default_ttl = ttl;
        }
        if let Some(capacity) = file.event_channel_capacity {
            self.hook.event_channel_capacity = capacity;
        }
        if let Some(level) = file.log_level {
            self.log_level = level;
        }
        if let Some(format) = file.log_format {
            self.log_format = format.parse()?;
        }

        self.config_file = Some(path.to_path_buf());
        Ok(())
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        self.level()?;

        let port = self
            .listen_address
            .rsplit_once(':')
            .map(|(host, port)| (host, port.parse::<u16>()));
        match port {
            Some((host, Ok(_))) if !host.is_empty() => {}
            _ => anyhow::bail!(
                "DNSHOOK_LISTEN_ADDRESS '{}' must be host:port. Example: 0.0.0.0:8080",
                self.listen_address
            ),
        }

        self.hook
            .validate()
            .context("Invalid orchestrator configuration")?;

        Ok(())
    }

    /// Parsed log level
    pub fn level(&self) -> Result<Level> {
        logging::parse_level(&self.log_level)
    }
}

/// Apply binary and key file overrides to an nsupdate updater
///
/// An empty key file disables TSIG authentication.
fn set_nsupdate_options(
    updater: &mut UpdaterConfig,
    new_binary: Option<String>,
    new_key_file: Option<String>,
) {
    if let UpdaterConfig::Nsupdate { binary, key_file } = updater {
        if let Some(new_binary) = new_binary {
            *binary = new_binary;
        }
        if let Some(new_key_file) = new_key_file {
            *key_file = Some(new_key_file).filter(|k| !k.trim().is_empty());
        }
    }
}

/// `:8080` listens on all interfaces
fn normalize_listen_address(address: &str) -> String {
    let address = address.trim();
    if address.starts_with(':') {
        format!("0.0.0.0{}", address)
    } else {
        address.to_string()
    }
}

fn parse_bool(name: &str, value: &str) -> Result<bool> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => anyhow::bail!("{} '{}' is not a boolean", name, value),
    }
}
