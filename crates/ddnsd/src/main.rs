// # ddnsd - DDNS Daemon
//
// Thin integration layer: all reconciliation logic lives in ddns-core.
//
// The ddnsd daemon is responsible for:
// 1. Loading the TOML configuration
// 2. Installing the logging dispatch described by `[log]`
// 3. Wiring the socket probe and the DNSPod provider into a Reconciler
// 4. Running it until SIGTERM/SIGINT, then shutting down within a grace period
//
// ## Configuration
//
// The configuration file is taken from, in order:
// - the first command-line argument
// - `DDNS_CONFIG`
// - `config.toml` in the working directory
//
// `DDNS_SECRET_ID` / `DDNS_SECRET_KEY` override the credentials in the file.
// `RUST_LOG` refines the level set by `log.level`.
//
// ## Example
//
// ```bash
// export DDNS_SECRET_KEY=your_key
// ddnsd /etc/ddns/config.toml
// ```

mod logging;

use anyhow::{Context, Result, anyhow};
use ddns_core::{DdnsConfig, EngineEvent, Reconciler};
use ddns_ip_socket::SocketAddressProbe;
use ddns_provider_dnspod::DnspodProvider;
use std::env;
use std::future::Future;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tracing::{debug, error, info, warn};

#[cfg(unix)]
use tokio::signal::unix::{SignalKind, signal};

/// Environment variable naming the configuration file
const CONFIG_ENV: &str = "DDNS_CONFIG";

/// Configuration file used when nothing else is given
const DEFAULT_CONFIG_PATH: &str = "config.toml";

/// Time the reconciler gets to stop after a shutdown signal
const SHUTDOWN_GRACE: Duration = Duration::from_secs(30);

/// Exit codes for different termination scenarios
///
/// These codes follow systemd conventions:
/// - 0: Clean shutdown
/// - 1: Configuration or startup error
/// - 2: Runtime error (unexpected)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DdnsExitCode {
    /// Clean shutdown (normal exit)
    CleanShutdown = 0,
    /// Configuration error or startup failure
    ConfigError = 1,
    /// Runtime error (unexpected failure)
    RuntimeError = 2,
}

impl From<DdnsExitCode> for ExitCode {
    fn from(code: DdnsExitCode) -> Self {
        ExitCode::from(code as u8)
    }
}

/// Resolve the configuration path from the CLI argument and environment
fn config_path(arg: Option<String>, env_value: Option<String>) -> PathBuf {
    arg.or(env_value.filter(|v| !v.trim().is_empty()))
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
}

/// Build the reconciler from a validated configuration
fn build_reconciler(config: DdnsConfig) -> Result<(Reconciler, mpsc::Receiver<EngineEvent>)> {
    let probe = SocketAddressProbe::new(&config.probe);
    let provider =
        DnspodProvider::from_config(&config.api).context("Failed to create DNSPod provider")?;

    Reconciler::new(Box::new(probe), Box::new(provider), config)
        .context("Failed to create reconciler")
}

fn main() -> ExitCode {
    let path = config_path(env::args().nth(1), env::var(CONFIG_ENV).ok());

    // Load configuration
    let config = match DdnsConfig::from_file(&path) {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Configuration error ({}): {}", path.display(), e);
            return DdnsExitCode::ConfigError.into();
        }
    };

    // Initialize tracing
    let rust_log = env::var("RUST_LOG").ok();
    let (dispatch, _log_guard) = match logging::build(&config.log, rust_log.as_deref()) {
        Ok(built) => built,
        Err(e) => {
            eprintln!("Logging setup error: {:#}", e);
            return DdnsExitCode::ConfigError.into();
        }
    };

    if let Err(e) = tracing::dispatcher::set_global_default(dispatch) {
        eprintln!("Failed to set tracing dispatcher: {}", e);
        return DdnsExitCode::ConfigError.into();
    }

    if let Some(template) = config.log.format.template() {
        warn!(
            format = template,
            "log.format is not one of full, compact, pretty, json; using full"
        );
    }

    info!(config = %path.display(), "Starting ddnsd daemon");
    info!(
        fqdn = %config.dns.fqdn(),
        record_type = %config.dns.record_type,
        record_line = %config.dns.record_line,
        interval_secs = config.engine.interval_secs,
        "Configuration loaded"
    );

    let (reconciler, events) = match build_reconciler(config) {
        Ok(built) => built,
        Err(e) => {
            error!("Startup error: {:#}", e);
            return DdnsExitCode::ConfigError.into();
        }
    };

    // Enter tokio runtime
    let rt = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("Failed to create tokio runtime: {}", e);
            return DdnsExitCode::RuntimeError.into();
        }
    };

    let result = rt.block_on(run_daemon(
        reconciler,
        events,
        wait_for_shutdown_signal(),
        SHUTDOWN_GRACE,
    ));

    daemon_exit_code(result).into()
}

/// Map the daemon's result onto the process exit code
fn daemon_exit_code(result: Result<()>) -> DdnsExitCode {
    match result {
        Ok(()) => {
            info!("ddnsd stopped");
            DdnsExitCode::CleanShutdown
        }
        Err(e) => {
            error!("Daemon error: {:#}", e);
            DdnsExitCode::RuntimeError
        }
    }
}

/// Run the reconciler until `shutdown_signal` resolves, then give it
/// `grace` to stop
async fn run_daemon<S>(
    reconciler: Reconciler,
    events: mpsc::Receiver<EngineEvent>,
    shutdown_signal: S,
    grace: Duration,
) -> Result<()>
where
    S: Future<Output = Result<&'static str>>,
{
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    tokio::spawn(log_events(events));
    let mut engine = tokio::spawn(async move { reconciler.run(shutdown_rx).await });

    let signal = tokio::select! {
        signal = shutdown_signal => signal?,
        joined = &mut engine => {
            return match joined {
                Ok(Ok(())) => Err(anyhow!("Reconciler stopped without a shutdown signal")),
                Ok(Err(e)) => Err(e).context("Reconciler failed"),
                Err(e) => Err(anyhow!("Reconciler task failed: {}", e)),
            };
        }
    };

    info!("Received shutdown signal: {}", signal);
    if shutdown_tx.send(true).is_err() {
        warn!("Reconciler already gone before shutdown");
    }

    match tokio::time::timeout(grace, engine).await {
        Ok(Ok(result)) => result.context("Reconciler failed during shutdown"),
        Ok(Err(e)) => Err(anyhow!("Reconciler task failed: {}", e)),
        Err(_) => Err(anyhow!("Shutdown timeout after {:?}", grace)),
    }
}

/// Drain engine events so the bounded channel never fills
async fn log_events(mut events: mpsc::Receiver<EngineEvent>) {
    while let Some(event) = events.recv().await {
        match event {
            EngineEvent::TickFailed {
                consecutive_failures,
                ..
            } if consecutive_failures > 1 => {
                warn!(consecutive_failures, "Reconciliation keeps failing");
            }
            event => debug!(?event, "Engine event"),
        }
    }
}

/// Wait for shutdown signals (SIGTERM, SIGINT)
///
/// # Returns
///
/// Returns the name of the signal received.
#[cfg(unix)]
async fn wait_for_shutdown_signal() -> Result<&'static str> {
    // Set up signal handlers for SIGTERM and SIGINT
    let mut sigterm = signal(SignalKind::terminate())
        .map_err(|e| anyhow!("Failed to setup SIGTERM handler: {}", e))?;
    let mut sigint = signal(SignalKind::interrupt())
        .map_err(|e| anyhow!("Failed to setup SIGINT handler: {}", e))?;

    Ok(tokio::select! {
        _ = sigterm.recv() => "SIGTERM",
        _ = sigint.recv() => "SIGINT",
    })
}

/// Wait for shutdown signals (SIGINT only)
///
/// Fallback implementation for non-Unix platforms.
#[cfg(not(unix))]
async fn wait_for_shutdown_signal() -> Result<&'static str> {
    tokio::signal::ctrl_c()
        .await
        .map_err(|e| anyhow!("Failed to wait for CTRL-C: {}", e))?;
    Ok("SIGINT")
}
