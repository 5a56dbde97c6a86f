//! ttydock daemon — entry point.
//!
//! Bridges a physical serial device to a stable PTY path so other processes
//! can read/write the device transparently, while intercepting
//! `CMD:`-prefixed lines in the device's byte stream to start and stop
//! `docker compose` service groups without a separate control channel.
//!
//! # Usage
//!
//! ```text
//! ttydock-daemon [OPTIONS]
//!
//! Options:
//!   --device <PATH>                  Serial device path [default: /dev/ttyUSB0]
//!   --baud <RATE>                    Baud rate [default: 115200]
//!   --read-timeout-ms <MS>           Serial read bound [default: 10]
//!   --command-prefix <PREFIX>        Control-line prefix [default: CMD:]
//!   --endpoint-link <PATH>           Stable PTY path [default: /tmp/ttydock]
//!   --state-file <PATH>              Discovery file [default: /tmp/ttydock.state]
//!   --compose-root <DIR>             Compose projects root [default: ./services]
//!   --http-bind <ADDR>               Control API bind address [default: 0.0.0.0]
//!   --http-port <PORT>               Control API port [default: 8080]
//!   --reconnect-backoff-secs <SECS>  Backoff after a failed open [default: 5]
//!   --status-poll-ms <MS>            Connected-session poll [default: 500]
//! ```
//!
//! Every option can also be set through a `TTYDOCK_*` environment variable;
//! CLI arguments take precedence when both are present.
//!
//! # What happens at startup
//!
//! 1. `tracing_subscriber` is initialised (`RUST_LOG` controls the level).
//! 2. CLI arguments are parsed into a [`DaemonConfig`].
//! 3. The virtual endpoint (PTY pair + stable symlink) is created — failure
//!    here is fatal, there is no bridge without it.
//! 4. The endpoint path is persisted to the state file for discovery.
//! 5. The control API listener is bound (fatal on port conflicts) and served.
//! 6. A Ctrl+C handler is installed; it clears the shared running flag.
//! 7. The connection supervisor runs until the flag clears, opening the
//!    serial device and driving one bridge session per link generation.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use ttydock_core::CommandRouter;
use ttydock_daemon::application::dispatch::ServiceOrchestrator;
use ttydock_daemon::domain::DaemonConfig;
use ttydock_daemon::infrastructure::control_api::{bind_control_api, serve_control_api};
use ttydock_daemon::infrastructure::endpoint::VirtualEndpoint;
use ttydock_daemon::infrastructure::orchestrator::ComposeOrchestrator;
use ttydock_daemon::infrastructure::serial::SerialConnector;
use ttydock_daemon::infrastructure::state_file;
use ttydock_daemon::infrastructure::supervisor::{ConnectionSupervisor, SupervisorTiming};

// ── CLI argument definitions ──────────────────────────────────────────────────

/// Serial-to-PTY bridge with in-band service orchestration.
#[derive(Debug, Parser)]
#[command(
    name = "ttydock-daemon",
    about = "Bridges a serial device to a stable PTY path and runs CMD:-tagged service commands",
    version
)]
struct Cli {
    /// Path of the physical serial device.
    #[arg(long, default_value = "/dev/ttyUSB0", env = "TTYDOCK_DEVICE")]
    device: PathBuf,

    /// Baud rate for the serial link.
    #[arg(long, default_value_t = 115_200, env = "TTYDOCK_BAUD")]
    baud: u32,

    /// Bound on a single serial read, in milliseconds.  Smaller values make
    /// shutdown snappier at the cost of more wakeups.
    #[arg(long, default_value_t = 10, env = "TTYDOCK_READ_TIMEOUT_MS")]
    read_timeout_ms: u64,

    /// Prefix marking an inbound line as a control command.
    #[arg(long, default_value = "CMD:", env = "TTYDOCK_COMMAND_PREFIX")]
    command_prefix: String,

    /// Stable path other processes open as if it were the device.
    #[arg(long, default_value = "/tmp/ttydock", env = "TTYDOCK_ENDPOINT_LINK")]
    endpoint_link: PathBuf,

    /// File the endpoint path is written into for discovery.
    #[arg(long, default_value = "/tmp/ttydock.state", env = "TTYDOCK_STATE_FILE")]
    state_file: PathBuf,

    /// Directory whose subdirectories each hold one compose project.
    #[arg(long, default_value = "./services", env = "TTYDOCK_COMPOSE_ROOT")]
    compose_root: PathBuf,

    /// IP address the control API binds to.
    #[arg(long, default_value = "0.0.0.0", env = "TTYDOCK_HTTP_BIND")]
    http_bind: String,

    /// TCP port of the control API.
    #[arg(long, default_value_t = 8080, env = "TTYDOCK_HTTP_PORT")]
    http_port: u16,

    /// Seconds to wait after a failed attempt to open the device.
    #[arg(long, default_value_t = 5, env = "TTYDOCK_RECONNECT_BACKOFF_SECS")]
    reconnect_backoff_secs: u64,

    /// Milliseconds between checks of a connected session.
    #[arg(long, default_value_t = 500, env = "TTYDOCK_STATUS_POLL_MS")]
    status_poll_ms: u64,
}

impl Cli {
    /// Converts the parsed CLI arguments into a [`DaemonConfig`].
    ///
    /// # Errors
    ///
    /// Returns an error if `--http-bind` is not a valid IP address.
    fn into_daemon_config(self) -> anyhow::Result<DaemonConfig> {
        let http_bind_addr: SocketAddr = format!("{}:{}", self.http_bind, self.http_port)
            .parse()
            .with_context(|| {
                format!(
                    "invalid control API bind address: '{}:{}'",
                    self.http_bind, self.http_port
                )
            })?;

        Ok(DaemonConfig {
            device_path: self.device,
            baud_rate: self.baud,
            read_timeout: Duration::from_millis(self.read_timeout_ms),
            command_prefix: self.command_prefix,
            endpoint_link_path: self.endpoint_link,
            state_file_path: self.state_file,
            compose_root: self.compose_root,
            http_bind_addr,
            reconnect_backoff: Duration::from_secs(self.reconnect_backoff_secs),
            status_poll_interval: Duration::from_millis(self.status_poll_ms),
            ..DaemonConfig::default()
        })
    }
}

// ── Entry point ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = Cli::parse().into_daemon_config()?;

    info!(
        "ttydock starting — device={}, endpoint={}, compose root={}",
        config.device_path.display(),
        config.endpoint_link_path.display(),
        config.compose_root.display()
    );

    // The endpoint is the one thing the process cannot run without.
    let endpoint = Arc::new(
        VirtualEndpoint::create(&config.endpoint_link_path)
            .context("failed to create virtual endpoint")?,
    );

    // Discovery file for collaborators.  Not load-bearing for the bridge
    // itself, so a failure is reported but does not abort startup.
    if let Err(e) = state_file::write_state_file(&config.state_file_path, endpoint.link_path()) {
        warn!("{e}; collaborators must be pointed at the endpoint manually");
    }

    // Shared shutdown signal, cleared exactly once by the Ctrl+C handler.
    let running = Arc::new(AtomicBool::new(true));
    let running_signal = Arc::clone(&running);
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("received Ctrl+C — initiating graceful shutdown");
                running_signal.store(false, Ordering::Relaxed);
            }
            Err(e) => {
                tracing::error!("failed to listen for Ctrl+C signal: {e}");
            }
        }
    });

    let orchestrator: Arc<dyn ServiceOrchestrator> =
        Arc::new(ComposeOrchestrator::new(config.compose_root.clone()));

    let supervisor = ConnectionSupervisor::new(
        SerialConnector::new(
            config.device_path.clone(),
            config.baud_rate,
            config.read_timeout,
        ),
        Arc::clone(&endpoint),
        CommandRouter::new(config.command_prefix.clone()),
        Arc::clone(&orchestrator),
        SupervisorTiming {
            reconnect_backoff: config.reconnect_backoff,
            status_poll_interval: config.status_poll_interval,
            endpoint_wait: config.endpoint_wait,
        },
        Arc::clone(&running),
    );
    let status = supervisor.status();

    // Bind before spawning so a port conflict fails startup loudly.
    let listener = bind_control_api(config.http_bind_addr).await?;
    let api_task = tokio::spawn(serve_control_api(
        listener,
        Arc::clone(&orchestrator),
        status,
        endpoint.link_path().display().to_string(),
        Arc::clone(&running),
    ));

    supervisor.run().await;

    if let Ok(Err(e)) = api_task.await {
        warn!("control API ended with error: {e:#}");
    }

    state_file::remove_state_file(&config.state_file_path);
    info!("ttydock stopped");
    Ok(())
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_defaults_produce_expected_device() {
        // Arrange: parse with no arguments (all defaults apply)
        let cli = Cli::parse_from(["ttydock-daemon"]);

        // Assert
        assert_eq!(cli.device, PathBuf::from("/dev/ttyUSB0"));
    }

    #[test]
    fn test_cli_defaults_produce_expected_baud() {
        let cli = Cli::parse_from(["ttydock-daemon"]);
        assert_eq!(cli.baud, 115_200);
    }

    #[test]
    fn test_cli_defaults_produce_expected_prefix() {
        let cli = Cli::parse_from(["ttydock-daemon"]);
        assert_eq!(cli.command_prefix, "CMD:");
    }

    #[test]
    fn test_cli_defaults_produce_expected_backoff() {
        let cli = Cli::parse_from(["ttydock-daemon"]);
        assert_eq!(cli.reconnect_backoff_secs, 5);
    }

    #[test]
    fn test_cli_device_override() {
        let cli = Cli::parse_from(["ttydock-daemon", "--device", "/dev/ttyACM3"]);
        assert_eq!(cli.device, PathBuf::from("/dev/ttyACM3"));
    }

    #[test]
    fn test_cli_baud_override() {
        let cli = Cli::parse_from(["ttydock-daemon", "--baud", "9600"]);
        assert_eq!(cli.baud, 9600);
    }

    #[test]
    fn test_cli_prefix_override() {
        let cli = Cli::parse_from(["ttydock-daemon", "--command-prefix", "@ctl "]);
        assert_eq!(cli.command_prefix, "@ctl ");
    }

    #[test]
    fn test_cli_http_port_override() {
        let cli = Cli::parse_from(["ttydock-daemon", "--http-port", "9999"]);
        assert_eq!(cli.http_port, 9999);
    }

    #[test]
    fn test_into_daemon_config_maps_durations() {
        // Arrange
        let cli = Cli::parse_from([
            "ttydock-daemon",
            "--read-timeout-ms",
            "25",
            "--reconnect-backoff-secs",
            "30",
            "--status-poll-ms",
            "250",
        ]);

        // Act
        let config = cli.into_daemon_config().unwrap();

        // Assert
        assert_eq!(config.read_timeout, Duration::from_millis(25));
        assert_eq!(config.reconnect_backoff, Duration::from_secs(30));
        assert_eq!(config.status_poll_interval, Duration::from_millis(250));
    }

    #[test]
    fn test_into_daemon_config_builds_http_addr() {
        let cli = Cli::parse_from([
            "ttydock-daemon",
            "--http-bind",
            "127.0.0.1",
            "--http-port",
            "9000",
        ]);
        let config = cli.into_daemon_config().unwrap();
        assert_eq!(config.http_bind_addr.to_string(), "127.0.0.1:9000");
    }

    #[test]
    fn test_into_daemon_config_invalid_bind_returns_error() {
        // Arrange: an invalid IP address string
        let cli = Cli::parse_from(["ttydock-daemon", "--http-bind", "not.an.ip"]);

        // Act
        let result = cli.into_daemon_config();

        // Assert: must return an error, not panic
        assert!(result.is_err());
    }

    #[test]
    fn test_into_daemon_config_keeps_paths() {
        let cli = Cli::parse_from([
            "ttydock-daemon",
            "--endpoint-link",
            "/run/bridge/tty",
            "--state-file",
            "/run/bridge/state",
            "--compose-root",
            "/opt/stacks",
        ]);
        let config = cli.into_daemon_config().unwrap();
        assert_eq!(config.endpoint_link_path, PathBuf::from("/run/bridge/tty"));
        assert_eq!(config.state_file_path, PathBuf::from("/run/bridge/state"));
        assert_eq!(config.compose_root, PathBuf::from("/opt/stacks"));
    }
}
