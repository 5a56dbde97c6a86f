//! Serial link access.
//!
//! The physical link is opened through the `serialport` crate with a short
//! read timeout, so the inbound pump's blocking reads are always bounded and
//! the shutdown flag is observed within one interval.  The opened port is
//! cloned into two independent handles — the inbound pump reads one, the
//! outbound pump writes the other — so the pumps never contend on a lock.
//!
//! [`LinkConnector`] is the seam the supervisor connects through.  The real
//! implementation is [`SerialConnector`]; tests inject flaky connectors to
//! exercise the reconnect state machine without hardware.

use std::io::{Read, Write};
use std::path::PathBuf;
use std::time::Duration;

use serialport::SerialPort;
use thiserror::Error;
use tracing::info;

/// Errors at the physical-link boundary.
#[derive(Debug, Error)]
pub enum LinkError {
    /// Opening the device failed.  Never fatal: the supervisor backs off
    /// and retries.
    #[error("failed to open serial device {path}: {source}")]
    Unavailable {
        path: PathBuf,
        #[source]
        source: serialport::Error,
    },

    /// A read or write failed mid-session.  Ends the session and triggers
    /// a reconnect; never fatal.
    #[error("serial link I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Opens a physical link and hands out its reader/writer halves.
///
/// The associated types let the supervisor and engine stay generic over the
/// transport, which is what makes them testable without a serial device.
pub trait LinkConnector: Send + Sync + 'static {
    type Reader: Read + Send + 'static;
    type Writer: Write + Send + 'static;

    /// Attempts to open the link.  Called once per reconnect cycle.
    fn connect(&self) -> Result<(Self::Reader, Self::Writer), LinkError>;
}

/// The production connector: opens a serial device at a configured baud rate
/// with a bounded read timeout.
#[derive(Debug, Clone)]
pub struct SerialConnector {
    device_path: PathBuf,
    baud_rate: u32,
    read_timeout: Duration,
}

impl SerialConnector {
    pub fn new(device_path: PathBuf, baud_rate: u32, read_timeout: Duration) -> Self {
        Self {
            device_path,
            baud_rate,
            read_timeout,
        }
    }
}

impl LinkConnector for SerialConnector {
    type Reader = Box<dyn SerialPort>;
    type Writer = Box<dyn SerialPort>;

    fn connect(&self) -> Result<(Self::Reader, Self::Writer), LinkError> {
        let path = self.device_path.to_string_lossy();
        let reader = serialport::new(path.as_ref(), self.baud_rate)
            .timeout(self.read_timeout)
            .open()
            .map_err(|source| LinkError::Unavailable {
                path: self.device_path.clone(),
                source,
            })?;

        // Independent handle for the outbound pump.  Reads and writes go
        // through separate clones so the two pumps never block each other.
        let writer = reader
            .try_clone()
            .map_err(|source| LinkError::Unavailable {
                path: self.device_path.clone(),
                source,
            })?;

        info!(
            "opened serial device {} at {} baud",
            self.device_path.display(),
            self.baud_rate
        );
        Ok((reader, writer))
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
