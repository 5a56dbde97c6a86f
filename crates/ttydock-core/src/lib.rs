//! # ttydock-core
//!
//! Shared library for ttydock containing the inbound line framer and the
//! embedded command router.
//!
//! This crate is pure: it has zero dependencies on OS APIs, serial ports,
//! PTYs, or async runtimes, which keeps the one algorithmically interesting
//! part of the bridge — turning an arbitrarily chunked byte stream into
//! classified lines — trivially unit-testable.
//!
//! # How the pieces fit
//!
//! The daemon's inbound pump reads raw chunks from the serial device and
//! feeds them to a [`LineFramer`], which buffers partial data across reads
//! and yields complete, trimmed lines in arrival order.  Each complete line
//! goes through a [`CommandRouter`], which decides one of three fates:
//!
//! - **`Forward`** – ordinary data, written verbatim to the virtual endpoint.
//! - **`Dispatch`** – a line carrying the reserved command prefix, parsed
//!   into a [`Command`] for the orchestration layer.
//! - **`Ignore`** – a command line with nothing after the prefix; logged and
//!   dropped so it can never leak into the transparent data path.

pub mod command;
pub mod framing;

// Re-export the most-used types at the crate root so callers can write
// `ttydock_core::LineFramer` instead of `ttydock_core::framing::LineFramer`.
pub use command::{Action, Command, CommandKind, CommandRouter, DEFAULT_COMMAND_PREFIX, STOP_ALL_TOKEN};
pub use framing::LineFramer;
