//! Daemon configuration types.
//!
//! [`DaemonConfig`] is the single source of truth for all runtime settings.
//! It is constructed once at startup from CLI arguments (with environment
//! fallbacks) and then shared behind an `Arc` by every task that needs it.
//!
//! Keeping configuration as a plain struct — no global state, no environment
//! reads inside the domain — makes the bridge easy to drive from tests.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

/// All runtime configuration for the bridge daemon.
#[derive(Debug, Clone)]
pub struct DaemonConfig {
    /// Path of the physical serial device.
    pub device_path: PathBuf,

    /// Baud rate for the serial link.
    pub baud_rate: u32,

    /// Bound on a single blocking serial read.  This is what keeps the
    /// inbound pump responsive to shutdown: every read returns within this
    /// interval whether or not data arrived.
    pub read_timeout: Duration,

    /// Prefix marking an inbound line as a control command.
    pub command_prefix: String,

    /// Stable filesystem path (a symlink to the PTY slave) that other
    /// processes open as if it were the real device.
    pub endpoint_link_path: PathBuf,

    /// File the daemon writes the endpoint path into at startup, for
    /// discovery by external collaborators.  Removed at clean shutdown.
    pub state_file_path: PathBuf,

    /// Directory whose subdirectories each hold one compose project.
    pub compose_root: PathBuf,

    /// Bind address for the HTTP control surface.
    pub http_bind_addr: SocketAddr,

    /// Sleep after a failed attempt to open the serial device.  Deliberately
    /// much longer than the connected-state poll: a missing device should
    /// not be hammered.
    pub reconnect_backoff: Duration,

    /// How often the supervisor checks a connected session for closure.
    pub status_poll_interval: Duration,

    /// Bound on the outbound pump's readability wait on the endpoint.
    pub endpoint_wait: Duration,
}

impl Default for DaemonConfig {
    /// Defaults match the classic single-device deployment: one USB serial
    /// adapter, the endpoint at `/tmp/ttydock`, compose projects under
    /// `./services`.
    fn default() -> Self {
        Self {
            device_path: PathBuf::from("/dev/ttyUSB0"),
            baud_rate: 115_200,
            read_timeout: Duration::from_millis(10),
            command_prefix: ttydock_core::DEFAULT_COMMAND_PREFIX.to_string(),
            endpoint_link_path: PathBuf::from("/tmp/ttydock"),
            state_file_path: PathBuf::from("/tmp/ttydock.state"),
            compose_root: PathBuf::from("./services"),
            // Safe: a compile-time-known valid socket address string.
            http_bind_addr: "0.0.0.0:8080".parse().unwrap(),
            reconnect_backoff: Duration::from_secs(5),
            status_poll_interval: Duration::from_millis(500),
            endpoint_wait: Duration::from_millis(100),
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
