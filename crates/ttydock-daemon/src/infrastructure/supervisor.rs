//! Link lifecycle supervision.
//!
//! The supervisor owns the connect / back off / reconnect state machine:
//!
//! ```text
//! Disconnected --(open succeeds)--> Connecting --(session started)--> Connected
//!      ^                                                                  |
//!      |                        (I/O error | shutdown)                    |
//!      +------------------------------------------------------------------+
//!      ^
//!      | Faulted: open attempt failed — same as Disconnected, but the next
//!      | attempt waits out the (much longer) reconnect backoff first.
//! ```
//!
//! Exactly one bridge session is alive per generation.  Before a new
//! generation starts, the previous session's pump handles are awaited, so
//! two sessions can never write the same link or endpoint concurrently.
//! While connected the supervisor only polls for session closure at a
//! coarse interval — it never reads or writes the link itself.

use std::sync::atomic::{AtomicBool, AtomicU64, AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tracing::{error, info, warn};
use ttydock_core::CommandRouter;

use crate::application::dispatch::ServiceOrchestrator;
use crate::infrastructure::endpoint::VirtualEndpoint;
use crate::infrastructure::engine::BridgeEngine;
use crate::infrastructure::serial::LinkConnector;

/// Lifecycle state of the physical link.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ConnectionState {
    Disconnected = 0,
    Connecting = 1,
    Connected = 2,
    Faulted = 3,
}

impl ConnectionState {
    fn from_u8(value: u8) -> Self {
        match value {
            1 => Self::Connecting,
            2 => Self::Connected,
            3 => Self::Faulted,
            _ => Self::Disconnected,
        }
    }

    /// Lowercase name for status reporting.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::Faulted => "faulted",
        }
    }
}

/// Shared, lock-free snapshot of the supervisor, read by the HTTP status
/// handler and by tests.
#[derive(Debug, Default)]
pub struct SupervisorStatus {
    state: AtomicU8,
    generation: AtomicU64,
    failed_attempts: AtomicU64,
}

impl SupervisorStatus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> ConnectionState {
        ConnectionState::from_u8(self.state.load(Ordering::Relaxed))
    }

    fn set_state(&self, state: ConnectionState) {
        self.state.store(state as u8, Ordering::Relaxed);
    }

    /// Generation of the most recent link; 0 before the first connect.
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Relaxed)
    }

    fn next_generation(&self) -> u64 {
        self.generation.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// Total failed open attempts since startup.
    pub fn failed_attempts(&self) -> u64 {
        self.failed_attempts.load(Ordering::Relaxed)
    }

    fn record_failure(&self) {
        self.failed_attempts.fetch_add(1, Ordering::Relaxed);
    }
}

/// Timing knobs the supervisor needs from the daemon configuration.
#[derive(Debug, Clone)]
pub struct SupervisorTiming {
    /// Sleep after a failed open attempt.
    pub reconnect_backoff: Duration,
    /// How often a connected session is checked for closure.
    pub status_poll_interval: Duration,
    /// Readability-wait bound handed to each session's outbound pump.
    pub endpoint_wait: Duration,
}

/// Owns the link lifecycle and starts one [`BridgeEngine`] per generation.
pub struct ConnectionSupervisor<C: LinkConnector> {
    connector: C,
    endpoint: Arc<VirtualEndpoint>,
    router: CommandRouter,
    orchestrator: Arc<dyn ServiceOrchestrator>,
    timing: SupervisorTiming,
    running: Arc<AtomicBool>,
    status: Arc<SupervisorStatus>,
}

impl<C: LinkConnector> ConnectionSupervisor<C> {
    pub fn new(
        connector: C,
        endpoint: Arc<VirtualEndpoint>,
        router: CommandRouter,
        orchestrator: Arc<dyn ServiceOrchestrator>,
        timing: SupervisorTiming,
        running: Arc<AtomicBool>,
    ) -> Self {
        Self {
            connector,
            endpoint,
            router,
            orchestrator,
            timing,
            running,
            status: Arc::new(SupervisorStatus::new()),
        }
    }

    /// Shared status handle, valid for the life of the process.
    pub fn status(&self) -> Arc<SupervisorStatus> {
        Arc::clone(&self.status)
    }

    /// Runs the reconnect loop until the running flag is cleared.
    pub async fn run(self) {
        while self.running.load(Ordering::Relaxed) {
            self.status.set_state(ConnectionState::Connecting);

            match self.connector.connect() {
                Ok((reader, writer)) => {
                    let generation = self.status.next_generation();
                    let engine = match BridgeEngine::start(
                        generation,
                        reader,
                        writer,
                        &self.endpoint,
                        self.router.clone(),
                        Arc::clone(&self.orchestrator),
                        Arc::clone(&self.running),
                        self.timing.endpoint_wait,
                    ) {
                        Ok(engine) => engine,
                        Err(e) => {
                            error!("failed to start bridge session: {e:#}");
                            self.status.set_state(ConnectionState::Faulted);
                            tokio::time::sleep(self.timing.reconnect_backoff).await;
                            continue;
                        }
                    };

                    self.status.set_state(ConnectionState::Connected);
                    info!(generation, "bridge session started");

                    // Coarse poll: the supervisor never touches the link
                    // itself, it only watches for the session to end.
                    while self.running.load(Ordering::Relaxed) && !engine.is_closed() {
                        tokio::time::sleep(self.timing.status_poll_interval).await;
                    }

                    // Both pumps must be gone before the next generation can
                    // own the link and the endpoint.
                    engine.join().await;
                    self.status.set_state(ConnectionState::Disconnected);
                    info!(generation, "bridge session ended");
                }
                Err(e) => {
                    self.status.record_failure();
                    self.status.set_state(ConnectionState::Faulted);
                    warn!(
                        "{e}; retrying in {:?}",
                        self.timing.reconnect_backoff
                    );
                    tokio::time::sleep(self.timing.reconnect_backoff).await;
                }
            }
        }

        self.status.set_state(ConnectionState::Disconnected);
        info!("supervisor stopped");
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_round_trips_through_u8() {
        for state in [
            ConnectionState::Disconnected,
            ConnectionState::Connecting,
            ConnectionState::Connected,
            ConnectionState::Faulted,
        ] {
            assert_eq!(ConnectionState::from_u8(state as u8), state);
        }
    }

    #[test]
    fn test_status_starts_disconnected_at_generation_zero() {
        // Arrange / Act
        let status = SupervisorStatus::new();

        // Assert
        assert_eq!(status.state(), ConnectionState::Disconnected);
        assert_eq!(status.generation(), 0);
        assert_eq!(status.failed_attempts(), 0);
    }

    #[test]
    fn test_next_generation_is_monotonic() {
        let status = SupervisorStatus::new();
        assert_eq!(status.next_generation(), 1);
        assert_eq!(status.next_generation(), 2);
        assert_eq!(status.generation(), 2);
    }

    #[test]
    fn test_record_failure_accumulates() {
        let status = SupervisorStatus::new();
        status.record_failure();
        status.record_failure();
        assert_eq!(status.failed_attempts(), 2);
    }

    #[test]
    fn test_state_names_are_lowercase() {
        assert_eq!(ConnectionState::Connected.as_str(), "connected");
        assert_eq!(ConnectionState::Faulted.as_str(), "faulted");
    }
}
