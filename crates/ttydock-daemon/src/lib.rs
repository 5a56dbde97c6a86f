//! ttydock-daemon library crate.
//!
//! This crate bridges a physical serial device to a virtual terminal
//! endpoint under a stable path, while intercepting a reserved command
//! syntax riding on the same byte stream to start and stop external service
//! groups.
//!
//! # Architecture (clean architecture)
//!
//! ```text
//! /dev/ttyUSB0 (physical serial device)
//!         ↕
//! [ttydock-daemon]
//!   ├── domain/           DaemonConfig — plain runtime settings
//!   ├── application/      ServiceOrchestrator seam + command dispatch
//!   └── infrastructure/
//!         ├── serial/       serial link open/clone (serialport)
//!         ├── endpoint/     PTY pair + stable symlink (nix)
//!         ├── engine/       the two directional pumps
//!         ├── supervisor/   connect / back off / reconnect state machine
//!         ├── orchestrator/ docker compose backend + test mock
//!         ├── control_api/  HTTP surface over the orchestrator (axum)
//!         └── state_file/   endpoint-path discovery file
//!         ↕
//! /tmp/ttydock (stable PTY path other processes open like the device)
//! ```
//!
//! # Layer rules
//!
//! - `domain` has no I/O and no async.
//! - `application` depends on `domain` and `ttydock-core` only.
//! - `infrastructure` depends on everything plus `tokio`, `serialport`,
//!   `nix`, and `axum`.

/// Domain layer: pure configuration types (no I/O).
pub mod domain;

/// Application layer: the orchestration seam and command dispatch.
pub mod application;

/// Infrastructure layer: serial link, PTY endpoint, pumps, supervision,
/// orchestration backend, HTTP surface, state file.
pub mod infrastructure;
