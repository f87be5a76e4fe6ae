// # dnshookd - DNS Webhook Daemon
//
// Thin integration layer around dnshook-core:
// 1. Reading configuration from the environment and an optional JSON file
// 2. Initializing logging and the runtime
// 3. Registering updaters and building the orchestrator
// 4. Serving the webhook endpoint until SIGTERM/SIGINT
//
// Record logic lives in dnshook-core; nothing here inspects a payload
// beyond handing it over.
//
// ## Configuration
//
// ### Listener
// - `DNSHOOK_LISTEN_ADDRESS`: `host:port` to bind (default `0.0.0.0:8080`, `:8080` allowed)
//
// ### DNS Server
// - `DNSHOOK_SERVER_ADDRESS`: Authoritative server, `host[:port]` (default `127.0.0.1:53`)
// - `DNSHOOK_DECLARE_ZONE`: Emit a `zone` line in forward scripts (default `false`)
// - `DNSHOOK_DEFAULT_TTL`: TTL used when a record carries none (default `300`)
//
// ### Updater
// - `DNSHOOK_UPDATER_TYPE`: `nsupdate` (default) or `dry_run`
// - `DNSHOOK_NSUPDATE_BINARY`: nsupdate executable (default `nsupdate`)
// - `DNSHOOK_TSIG_KEY_FILE`: TSIG key file (default `/etc/nsupdate.key`, empty disables)
// - `DNSHOOK_MODE`: `dry-run` logs nsupdate scripts instead of running them
//
// ### Logging
// - `DNSHOOK_LOG_LEVEL`: trace, debug, info, warn, error (default `info`)
// - `DNSHOOK_LOG_FORMAT`: `text` or `json`
//
// ### Config File
// - `DNSHOOK_CONFIG_FILE`: JSON file overriding the above (default `config.json` if present)
//
// ## Example
//
// ```bash
// export DNSHOOK_SERVER_ADDRESS=10.0.0.53
// export DNSHOOK_TSIG_KEY_FILE=/etc/bind/ddns.key
//
// dnshookd
// ```

mod config;
mod logging;
mod server;

use std::process::ExitCode;
use std::time::Duration;

use anyhow::Result;
use dnshook_core::{HookEvent, Orchestrator, UpdaterRegistry};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

#[cfg(unix)]
use tokio::signal::unix::{SignalKind, signal};

use crate::config::DaemonConfig;
use crate::server::AppState;

/// Longest wait for accepted updates once the listener has stopped
const DRAIN_TIMEOUT: Duration = Duration::from_secs(30);

/// Exit codes for different termination scenarios
///
/// These codes follow systemd conventions:
/// - 0: Clean shutdown
/// - 1: Configuration or startup error
/// - 2: Runtime error (unexpected)
#[derive(Debug, Clone, Copy)]
enum DnshookExitCode {
    /// Clean shutdown (normal exit)
    CleanShutdown = 0,
    /// Configuration error or startup failure
    ConfigError = 1,
    /// Runtime error (unexpected failure)
    RuntimeError = 2,
}

impl From<DnshookExitCode> for ExitCode {
    fn from(code: DnshookExitCode) -> Self {
        ExitCode::from(code as u8)
    }
}

fn main() -> ExitCode {
    let config = match DaemonConfig::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Configuration error: {:#}", e);
            return DnshookExitCode::ConfigError.into();
        }
    };

    if let Err(e) = config.validate() {
        eprintln!("Configuration validation error: {:#}", e);
        return DnshookExitCode::ConfigError.into();
    }

    let init = config
        .level()
        .and_then(|level| logging::init_tracing(level, config.log_format));
    if let Err(e) = init {
        eprintln!("Failed to set tracing subscriber: {}", e);
        return DnshookExitCode::ConfigError.into();
    }

    info!("Starting dnshookd daemon");
    if let Some(path) = &config.config_file {
        info!(path = %path.display(), "Config file applied");
    }

    let rt = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("Failed to create tokio runtime: {}", e);
            return DnshookExitCode::RuntimeError.into();
        }
    };

    rt.block_on(async {
        match run_daemon(config).await {
            Ok(()) => DnshookExitCode::CleanShutdown,
            Err(e) => {
                error!("Daemon error: {:#}", e);
                DnshookExitCode::RuntimeError
            }
        }
    })
    .into()
}

/// Run the daemon
async fn run_daemon(config: DaemonConfig) -> Result<()> {
    let registry = UpdaterRegistry::with_builtin();

    #[cfg(feature = "nsupdate")]
    {
        info!("Registering nsupdate updater");
        dnshook_nsupdate::register(&registry);
    }

    let updater = registry.create_updater(&config.hook.updater)?;
    let (orchestrator, events) = Orchestrator::new(updater, &config.hook)?;
    tokio::spawn(drain_events(events));

    info!(
        server = %config.hook.server,
        updater = config.hook.updater.type_name(),
        declare_zone = config.hook.declare_zone,
        default_ttl = config.hook.default_ttl,
        "Orchestrator ready"
    );

    let app = server::router(AppState {
        orchestrator: orchestrator.clone(),
    });
    let listener = tokio::net::TcpListener::bind(&config.listen_address)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to bind {}: {}", config.listen_address, e))?;

    info!(address = %config.listen_address, "Listening for webhooks");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Shutting down daemon");

    // Accepted events keep running; dropping the runtime would kill their
    // nsupdate processes mid-script
    if tokio::time::timeout(DRAIN_TIMEOUT, orchestrator.shutdown())
        .await
        .is_err()
    {
        warn!(pending = orchestrator.in_flight(), "Updates still running at shutdown");
        anyhow::bail!("Shutdown timeout after {:?}", DRAIN_TIMEOUT);
    }

    Ok(())
}

/// Consume orchestrator events so producers never see a full channel
async fn drain_events(mut events: mpsc::Receiver<HookEvent>) {
    while let Some(event) = events.recv().await {
        debug!(?event, "Hook event");
    }
}

/// Resolve once SIGTERM or SIGINT arrives
#[cfg(unix)]
async fn shutdown_signal() {
    let (mut sigterm, mut sigint) = match (
        signal(SignalKind::terminate()),
        signal(SignalKind::interrupt()),
    ) {
        (Ok(sigterm), Ok(sigint)) => (sigterm, sigint),
        (Err(e), _) | (_, Err(e)) => {
            error!("Failed to setup signal handlers: {}", e);
            std::future::pending::<()>().await;
            return;
        }
    };

    let signal = tokio::select! {
        _ = sigterm.recv() => "SIGTERM",
        _ = sigint.recv() => "SIGINT",
    };
    info!("Received shutdown signal: {}", signal);
}

/// Resolve once CTRL-C arrives
///
/// Fallback implementation for non-Unix platforms.
#[cfg(not(unix))]
async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("Received shutdown signal: SIGINT"),
        Err(e) => {
            error!("Failed to wait for CTRL-C: {}", e);
            std::future::pending::<()>().await;
        }
    }
}
