//! The bridge engine: two directional pumps over one connected link.
//!
//! A session binds one `(link reader, link writer, endpoint, generation)`
//! and runs until the link dies or shutdown is requested:
//!
//! - **Inbound pump** (link → endpoint): timeout-bounded chunk reads feed a
//!   session-private [`LineFramer`]; each complete line is classified by the
//!   [`CommandRouter`] — data lines and command outcomes are written to the
//!   endpoint, command lines are dispatched to the orchestrator
//!   synchronously on this thread.
//! - **Outbound pump** (endpoint → link): bounded readability waits on the
//!   endpoint master, raw chunks written to the link untouched.  Commands
//!   only flow device → endpoint, so this direction is pure passthrough.
//!
//! Both pumps run on blocking worker threads (`spawn_blocking`): serial and
//! PTY I/O here is synchronous, bounded-timeout I/O, and the pumps are the
//! only two long-lived blocking loops in the process.  They check the shared
//! flags every iteration and treat "link no longer open" as the single
//! unified termination trigger, so neither outlives the other by more than
//! one poll interval.

use std::io::{Read, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use ttydock_core::{Action, CommandRouter, LineFramer};

use crate::application::dispatch::{dispatch_command, ServiceOrchestrator};
use crate::infrastructure::endpoint::{EndpointSource, VirtualEndpoint};

/// Sleep after an empty link read, so an idle link polls rather than spins.
const IDLE_YIELD: Duration = Duration::from_millis(5);

/// Buffer size for a single directional chunk.
const CHUNK_SIZE: usize = 1024;

/// The two flags every pump iteration consults.
///
/// `running` is the process-wide shutdown signal (cleared exactly once);
/// `link_open` is session-scoped and cleared by whichever pump first
/// observes a link failure.
#[derive(Clone)]
pub struct SessionFlags {
    running: Arc<AtomicBool>,
    link_open: Arc<AtomicBool>,
}

impl SessionFlags {
    pub fn new(running: Arc<AtomicBool>) -> Self {
        Self {
            running,
            link_open: Arc::new(AtomicBool::new(true)),
        }
    }

    /// True while the session should keep pumping.
    pub fn is_live(&self) -> bool {
        self.running.load(Ordering::Relaxed) && self.link_open.load(Ordering::Relaxed)
    }

    /// Marks the link dead, stopping both pumps within one poll interval.
    pub fn close_link(&self) {
        self.link_open.store(false, Ordering::Relaxed);
    }

    pub fn link_open(&self) -> bool {
        self.link_open.load(Ordering::Relaxed)
    }
}

/// One running bridge session.
pub struct BridgeEngine {
    generation: u64,
    flags: SessionFlags,
    inbound: JoinHandle<()>,
    outbound: JoinHandle<()>,
}

impl BridgeEngine {
    /// Spawns both pumps for a freshly opened link.
    ///
    /// The engine borrows the endpoint only to clone per-session master
    /// handles; the endpoint itself outlives every session.
    pub fn start<R, W>(
        generation: u64,
        link_reader: R,
        link_writer: W,
        endpoint: &VirtualEndpoint,
        router: CommandRouter,
        orchestrator: Arc<dyn ServiceOrchestrator>,
        running: Arc<AtomicBool>,
        endpoint_wait: Duration,
    ) -> anyhow::Result<Self>
    where
        R: Read + Send + 'static,
        W: Write + Send + 'static,
    {
        let flags = SessionFlags::new(running);
        let sink = endpoint
            .writer()
            .context("failed to clone endpoint write handle")?;
        let source = endpoint
            .reader()
            .context("failed to clone endpoint read handle")?;

        let inbound = tokio::task::spawn_blocking({
            let flags = flags.clone();
            move || run_inbound_pump(link_reader, sink, router, orchestrator, flags, generation)
        });
        let outbound = tokio::task::spawn_blocking({
            let flags = flags.clone();
            move || run_outbound_pump(source, link_writer, flags, endpoint_wait, generation)
        });

        Ok(Self {
            generation,
            flags,
            inbound,
            outbound,
        })
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// True once the session's link has been marked dead.
    pub fn is_closed(&self) -> bool {
        !self.flags.link_open()
    }

    /// Waits for both pumps to exit.  The supervisor must call this before
    /// starting the next generation so two sessions never share the link or
    /// the endpoint.
    pub async fn join(self) {
        let _ = self.inbound.await;
        let _ = self.outbound.await;
        debug!(generation = self.generation, "both pumps exited");
    }
}

// ── Inbound pump ──────────────────────────────────────────────────────────────

/// Link → endpoint: frame, classify, forward or dispatch.
pub(crate) fn run_inbound_pump<R, W>(
    mut link: R,
    mut sink: W,
    router: CommandRouter,
    orchestrator: Arc<dyn ServiceOrchestrator>,
    flags: SessionFlags,
    generation: u64,
) where
    R: Read,
    W: Write,
{
    let mut framer = LineFramer::new();
    let mut buf = [0u8; CHUNK_SIZE];

    while flags.is_live() {
        match link.read(&mut buf) {
            Ok(0) => std::thread::sleep(IDLE_YIELD),
            Ok(n) => {
                // Every line already framed is handled before the flags are
                // rechecked, so complete lines are never lost to a shutdown
                // that races the read.
                for line in framer.feed(&buf[..n]) {
                    if !handle_line(&line, &mut sink, &router, orchestrator.as_ref(), generation)
                    {
                        flags.close_link();
                        break;
                    }
                }
            }
            // The bounded read elapsed without data; go around and recheck
            // the flags.
            Err(e)
                if e.kind() == std::io::ErrorKind::TimedOut
                    || e.kind() == std::io::ErrorKind::WouldBlock
                    || e.kind() == std::io::ErrorKind::Interrupted => {}
            Err(e) => {
                warn!(generation, "link read failed: {e}; ending session");
                flags.close_link();
            }
        }
    }

    flags.close_link();
    debug!(
        generation,
        discarded = framer.pending_len(),
        "inbound pump exited"
    );
}

/// Acts on one classified line.  Returns `false` if the endpoint write
/// failed, which ends the session.
fn handle_line<W: Write>(
    line: &str,
    sink: &mut W,
    router: &CommandRouter,
    orchestrator: &dyn ServiceOrchestrator,
    generation: u64,
) -> bool {
    match router.route(line) {
        Action::Forward(text) => write_line(sink, &text, generation),
        Action::Dispatch(cmd) => {
            info!(generation, command = %cmd.raw, "dispatching control command");
            // Synchronous on purpose: a slow orchestration call blocks
            // inbound forwarding, and commands are rare enough that this
            // beats a worker pool.
            let outcome = dispatch_command(&cmd, orchestrator);
            debug!(generation, %outcome, "command outcome");
            write_line(sink, &outcome, generation)
        }
        Action::Ignore => {
            warn!(generation, line, "dropping malformed command line");
            true
        }
    }
}

fn write_line<W: Write>(sink: &mut W, text: &str, generation: u64) -> bool {
    let result = sink
        .write_all(text.as_bytes())
        .and_then(|()| sink.write_all(b"\n"))
        .and_then(|()| sink.flush());
    match result {
        Ok(()) => true,
        Err(e) => {
            warn!(generation, "endpoint write failed: {e}; ending session");
            false
        }
    }
}

// ── Outbound pump ─────────────────────────────────────────────────────────────

/// Endpoint → link: raw passthrough, no framing, no filtering.
pub(crate) fn run_outbound_pump<S, W>(
    mut source: S,
    mut link: W,
    flags: SessionFlags,
    wait: Duration,
    generation: u64,
) where
    S: EndpointSource,
    W: Write,
{
    let mut buf = [0u8; CHUNK_SIZE];

    while flags.is_live() {
        match source.wait_readable(wait) {
            Ok(false) => continue,
            Ok(true) => match source.read_chunk(&mut buf) {
                // Spurious wakeup; nothing to ship.
                Ok(0) => std::thread::sleep(IDLE_YIELD),
                Ok(n) => {
                    if let Err(e) = link.write_all(&buf[..n]).and_then(|()| link.flush()) {
                        warn!(generation, "link write failed: {e}; ending session");
                        flags.close_link();
                    }
                }
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => {}
                Err(e) => {
                    warn!(generation, "endpoint read failed: {e}; ending session");
                    flags.close_link();
                }
            },
            Err(e) => {
                warn!(generation, "endpoint wait failed: {e}; ending session");
                flags.close_link();
            }
        }
    }

    flags.close_link();
    debug!(generation, "outbound pump exited");
}

// ── Tests ─────────────────────────────────────────────────────────────────────
