//! Configuration types for the dnshook system
//!
//! This module defines the configuration consumed by the orchestrator and
//! the updater registry. Loading (environment, files) is left to the binary.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::compiler::{CompilePolicy, DEFAULT_TTL};

/// Port used when the server address omits one
pub const DEFAULT_DNS_PORT: u16 = 53;

/// Key file handed to `nsupdate -k` unless configured otherwise
pub const DEFAULT_KEY_FILE: &str = "/etc/nsupdate.key";

/// Main hook configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HookConfig {
    /// Authoritative server receiving the updates (`host[:port]`)
    #[serde(default)]
    pub server: ServerAddress,

    /// Updater executing the rendered scripts
    #[serde(default)]
    pub updater: UpdaterConfig,

    /// TTL applied when an event carries none
    #[serde(default = "default_ttl")]
    pub default_ttl: u32,

    /// Emit a `zone` line when the record's zone is known
    ///
    /// Off by default: the server infers the zone from the record names.
    #[serde(default)]
    pub declare_zone: bool,

    /// Capacity of the outcome event channel
    ///
    /// When full, new outcome events are dropped (with a warning log).
    #[serde(default = "default_event_channel_capacity")]
    pub event_channel_capacity: usize,
}

impl HookConfig {
    /// Create a new configuration with defaults
    pub fn new() -> Self {
        Self {
            server: ServerAddress::default(),
            updater: UpdaterConfig::default(),
            default_ttl: default_ttl(),
            declare_zone: false,
            event_channel_capacity: default_event_channel_capacity(),
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.server.host.is_empty() {
            return Err(crate::Error::config("Server host cannot be empty"));
        }
        if self.default_ttl == 0 || self.default_ttl > i32::MAX as u32 {
            return Err(crate::Error::config(format!(
                "Default TTL must be between 1 and {}",
                i32::MAX
            )));
        }
        if self.event_channel_capacity == 0 {
            return Err(crate::Error::config("Event channel capacity must be > 0"));
        }

        self.updater.validate()
    }

    /// Compilation knobs derived from this configuration
    pub fn compile_policy(&self) -> CompilePolicy {
        CompilePolicy {
            default_ttl: self.default_ttl,
        }
    }
}

impl Default for HookConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Target nameserver address
///
/// Parsed from `host`, `host:port`, `[v6]:port` or a bare IPv6 literal.
/// A missing port means 53.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ServerAddress {
    /// Host name or IP literal (IPv6 without brackets)
    pub host: String,
    /// UDP/TCP port
    pub port: u16,
}

impl ServerAddress {
    /// Create an address from its parts
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    /// Parse `host[:port]`
    pub fn parse(address: &str) -> Result<Self, crate::Error> {
        let address = address.trim();
        if address.is_empty() {
            return Err(crate::Error::config("Server address cannot be empty"));
        }

        let (host, port) = if let Some(rest) = address.strip_prefix('[') {
            let (host, tail) = rest.split_once(']').ok_or_else(|| {
                crate::Error::config(format!("Unterminated '[' in server address: {}", address))
            })?;
            let port = match tail {
                "" => DEFAULT_DNS_PORT,
                tail => match tail.strip_prefix(':') {
                    Some(port) => parse_port(port, address)?,
                    None => {
                        return Err(crate::Error::config(format!(
                            "Unexpected text after ']' in server address: {}",
                            address
                        )));
                    }
                },
            };
            (host, port)
        } else {
            match address.rsplit_once(':') {
                // A second colon means an unbracketed IPv6 literal
                Some((host, port)) if !host.contains(':') => (host, parse_port(port, address)?),
                _ => (address, DEFAULT_DNS_PORT),
            }
        };

        if host.is_empty() {
            return Err(crate::Error::config(format!(
                "Server address has no host: {}",
                address
            )));
        }

        Ok(Self::new(host, port))
    }
}

fn parse_port(port: &str, address: &str) -> Result<u16, crate::Error> {
    port.parse().map_err(|_| {
        crate::Error::config(format!("Invalid port in server address: {}", address))
    })
}

impl Default for ServerAddress {
    fn default() -> Self {
        Self::new("127.0.0.1", DEFAULT_DNS_PORT)
    }
}

impl fmt::Display for ServerAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.host.contains(':') {
            write!(f, "[{}]:{}", self.host, self.port)
        } else {
            write!(f, "{}:{}", self.host, self.port)
        }
    }
}

impl TryFrom<String> for ServerAddress {
    type Error = crate::Error;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<ServerAddress> for String {
    fn from(address: ServerAddress) -> Self {
        address.to_string()
    }
}

/// Updater configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum UpdaterConfig {
    /// Run scripts through the `nsupdate` binary
    Nsupdate {
        /// Binary to execute (looked up on `PATH` when relative)
        #[serde(default = "default_nsupdate_binary")]
        binary: String,
        /// TSIG key file passed with `-k`; `null` disables authentication
        #[serde(default = "default_key_file")]
        key_file: Option<String>,
    },

    /// Log and record scripts without contacting any server
    DryRun,

    /// Custom updater
    Custom {
        /// Factory name to use
        factory: String,
        /// Custom configuration data
        config: serde_json::Value,
    },
}

impl UpdaterConfig {
    /// Validate the updater configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        match self {
            UpdaterConfig::Nsupdate { binary, key_file } => {
                if binary.is_empty() {
                    return Err(crate::Error::config("nsupdate binary cannot be empty"));
                }
                if key_file.as_deref() == Some("") {
                    return Err(crate::Error::config("TSIG key file path cannot be empty"));
                }
                Ok(())
            }
            UpdaterConfig::Custom { factory, config } => {
                if factory.is_empty() {
                    return Err(crate::Error::config("Custom updater factory cannot be empty"));
                }
                if config.is_null() {
                    return Err(crate::Error::config("Custom updater config cannot be null"));
                }
                Ok(())
            }
            UpdaterConfig::DryRun => Ok(()),
        }
    }

    /// Get the updater type name used for registry lookup
    pub fn type_name(&self) -> &str {
        match self {
            UpdaterConfig::Nsupdate { .. } => "nsupdate",
            UpdaterConfig::DryRun => "dry_run",
            UpdaterConfig::Custom { factory, .. } => factory,
        }
    }

    /// Key material reference carried with every update request
    pub fn key_ref(&self) -> Option<&str> {
        match self {
            UpdaterConfig::Nsupdate { key_file, .. } => key_file.as_deref(),
            _ => None,
        }
    }
}

impl Default for UpdaterConfig {
    fn default() -> Self {
        UpdaterConfig::Nsupdate {
            binary: default_nsupdate_binary(),
            key_file: default_key_file(),
        }
    }
}

fn default_ttl() -> u32 {
    DEFAULT_TTL
}

fn default_event_channel_capacity() -> usize {
    1000
}

fn default_nsupdate_binary() -> String {
    "nsupdate".to_string()
}

fn default_key_file() -> Option<String> {
    Some(DEFAULT_KEY_FILE.to_string())
}
