//! Command dispatch: from a parsed [`Command`] to outcome text.
//!
//! The command channel rides on the transparent byte stream, so every
//! recognized-looking command gets a textual answer — success or error —
//! written back through the same path as forwarded data.  The originator
//! never receives silence.
//!
//! Dispatch runs synchronously on the inbound pump's thread of control.  A
//! slow orchestration call therefore blocks inbound forwarding until it
//! returns; commands are rare relative to data traffic, so this is an
//! accepted latency tradeoff rather than a defect.

use std::collections::BTreeMap;

use thiserror::Error;
use ttydock_core::{Command, CommandKind};

/// Errors surfaced by an orchestration backend.
///
/// None of these end the bridge session: the rendered text becomes the
/// command's reported outcome.
#[derive(Debug, Error)]
pub enum OrchestrationError {
    /// The named service has no compose project on disk.
    #[error("unknown service: {0}")]
    UnknownService(String),

    /// The orchestration tool could not be spawned at all.
    #[error("failed to run {tool}: {source}")]
    Spawn {
        tool: String,
        #[source]
        source: std::io::Error,
    },

    /// The orchestration tool ran but exited non-zero.
    #[error("{tool} exited with {status}: {stderr}")]
    CommandFailed {
        tool: String,
        status: String,
        stderr: String,
    },

    /// The compose root could not be scanned.
    #[error("failed to scan compose root {path}: {source}")]
    Discovery {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// External capability to list/start/stop named service groups.
///
/// Implemented by `ComposeOrchestrator` over the `docker compose` CLI, and
/// by `MockOrchestrator` in tests.  All methods are synchronous and may be
/// slow; callers on async tasks must wrap them in `spawn_blocking`.
pub trait ServiceOrchestrator: Send + Sync {
    /// Every known service with a human-readable status text.
    fn list_services(&self) -> Result<BTreeMap<String, String>, OrchestrationError>;

    /// Starts one service group; returns a human-readable result.
    fn start_service(&self, name: &str) -> Result<String, OrchestrationError>;

    /// Stops one service group; stopping an already-stopped group succeeds.
    fn stop_service(&self, name: &str) -> Result<String, OrchestrationError>;

    /// Stops every known service group, reporting one line per service.
    fn stop_all(&self) -> Result<String, OrchestrationError>;
}

/// Executes `cmd` against `orchestrator` and renders the outcome as text.
///
/// The returned string is what the bridge writes back to the virtual
/// endpoint; it is never empty.
pub fn dispatch_command(cmd: &Command, orchestrator: &dyn ServiceOrchestrator) -> String {
    let result = match cmd.kind() {
        CommandKind::List => orchestrator.list_services().map(render_service_list),
        CommandKind::Start(name) => orchestrator.start_service(name),
        CommandKind::Stop(name) => orchestrator.stop_service(name),
        CommandKind::StopAll => orchestrator.stop_all(),
        CommandKind::Unknown => {
            return format!("error: unrecognized command '{}'", cmd.raw);
        }
    };

    match result {
        Ok(text) => text,
        Err(e) => format!("error: {e}"),
    }
}

fn render_service_list(services: BTreeMap<String, String>) -> String {
    if services.is_empty() {
        return "no services discovered".to_string();
    }
    services
        .iter()
        .map(|(name, status)| format!("{name}: {status}"))
        .collect::<Vec<_>>()
        .join("\n")
}

// ── Tests ─────────────────────────────────────────────────────────────────────
