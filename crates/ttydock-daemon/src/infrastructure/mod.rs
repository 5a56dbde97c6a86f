//! Infrastructure layer for ttydock-daemon.
//!
//! Everything that touches the outside world lives here:
//!
//! - Opening the physical serial device and cloning it into independent
//!   reader/writer handles
//! - Allocating the PTY pair and publishing its stable symlink
//! - Running the two directional pumps of a bridge session
//! - Supervising the link lifecycle (connect, back off, reconnect)
//! - Invoking `docker compose` for discovered service groups
//! - Serving the HTTP control surface
//! - Writing and removing the endpoint-path state file
//!
//! # What does NOT belong here?
//!
//! - Line framing and command classification (ttydock-core)
//! - Outcome rendering for dispatched commands (application layer)
//! - Configuration parsing (main.rs)

pub mod control_api;
pub mod endpoint;
pub mod engine;
pub mod orchestrator;
pub mod serial;
pub mod state_file;
pub mod supervisor;

// Re-export the primary entry points so `main.rs` can call them concisely.
pub use control_api::serve_control_api;
pub use supervisor::ConnectionSupervisor;
