//! The virtual terminal endpoint.
//!
//! A PTY pair is allocated once at process start.  The daemon keeps both
//! ends: the master is the internal handle the two pumps read and write,
//! and the slave's device path is published under a stable symlink so other
//! processes can open it as if it were the real serial device.  Holding the
//! slave open for the process lifetime also keeps the master usable while
//! no external process is attached.
//!
//! The slave is switched to raw mode at creation.  With the default cooked
//! termios, the line discipline echoes every byte the inbound pump writes
//! into the master straight back out of the master — which the outbound
//! pump would then ship to the device as if a collaborator had sent it.
//!
//! There is no error recovery here: failure to allocate the endpoint is
//! fatal to the whole process, because there is no bridge without it.

use std::fs::File;
use std::io::{self, Read, Write};
use std::os::fd::{AsFd, OwnedFd};
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use nix::poll::{poll, PollFd, PollFlags, PollTimeout};
use nix::pty::openpty;
use nix::sys::termios::{cfmakeraw, tcgetattr, tcsetattr, SetArg};
use tracing::{debug, info, warn};

/// The paired PTY handles plus the stable symlink other processes open.
pub struct VirtualEndpoint {
    /// Internal handle shared (on disjoint directions) by the two pumps.
    master: File,
    /// Held open so the master never reads EOF while no peer is attached.
    _slave: OwnedFd,
    /// The actual slave device path (e.g. `/dev/pts/4`).
    pty_path: PathBuf,
    /// The stable symlink pointing at `pty_path`.
    link_path: PathBuf,
}

impl VirtualEndpoint {
    /// Allocates the PTY pair and publishes `link_path` as a symlink to the
    /// slave device.  A stale symlink or file at `link_path` is replaced.
    pub fn create(link_path: &Path) -> anyhow::Result<Self> {
        let pty = openpty(None, None).context("failed to allocate PTY pair")?;

        // Raw slave termios: no echo, no line editing, no signal keys.
        let mut termios =
            tcgetattr(&pty.slave).context("failed to read PTY slave attributes")?;
        cfmakeraw(&mut termios);
        tcsetattr(&pty.slave, SetArg::TCSANOW, &termios)
            .context("failed to set PTY slave raw")?;

        let pty_path =
            nix::unistd::ttyname(&pty.slave).context("failed to resolve PTY slave path")?;

        if link_path.symlink_metadata().is_ok() {
            std::fs::remove_file(link_path).with_context(|| {
                format!("failed to remove stale endpoint link {}", link_path.display())
            })?;
        }
        std::os::unix::fs::symlink(&pty_path, link_path).with_context(|| {
            format!(
                "failed to link {} -> {}",
                link_path.display(),
                pty_path.display()
            )
        })?;

        info!(
            "virtual endpoint ready: {} -> {}",
            link_path.display(),
            pty_path.display()
        );

        Ok(Self {
            master: File::from(pty.master),
            _slave: pty.slave,
            pty_path,
            link_path: link_path.to_path_buf(),
        })
    }

    /// The stable path other processes open.
    pub fn link_path(&self) -> &Path {
        &self.link_path
    }

    /// The underlying slave device path.
    pub fn pty_path(&self) -> &Path {
        &self.pty_path
    }

    /// A write handle on the master for the inbound pump.
    pub fn writer(&self) -> io::Result<EndpointWriter> {
        Ok(EndpointWriter {
            master: self.master.try_clone()?,
        })
    }

    /// A read handle on the master for the outbound pump.
    pub fn reader(&self) -> io::Result<EndpointReader> {
        Ok(EndpointReader {
            master: self.master.try_clone()?,
        })
    }
}

impl Drop for VirtualEndpoint {
    fn drop(&mut self) {
        if let Err(e) = std::fs::remove_file(&self.link_path) {
            warn!(
                "failed to remove endpoint link {}: {e}",
                self.link_path.display()
            );
        } else {
            debug!("removed endpoint link {}", self.link_path.display());
        }
    }
}

/// Write-only view of the endpoint master, owned by the inbound pump.
pub struct EndpointWriter {
    master: File,
}

impl Write for EndpointWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.master.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.master.flush()
    }
}

/// Something the outbound pump can wait on and read raw bytes from.
///
/// The production implementation is [`EndpointReader`]; tests substitute an
/// in-memory source to drive the pump without a PTY.
pub trait EndpointSource: Send {
    /// Waits up to `timeout` for data.  `Ok(false)` means the wait elapsed;
    /// the caller rechecks its flags and waits again.
    fn wait_readable(&mut self, timeout: Duration) -> io::Result<bool>;

    /// Reads at most `buf.len()` bytes; only called after a readable wait.
    fn read_chunk(&mut self, buf: &mut [u8]) -> io::Result<usize>;
}

/// Read-only view of the endpoint master, owned by the outbound pump.
pub struct EndpointReader {
    master: File,
}

impl EndpointSource for EndpointReader {
    fn wait_readable(&mut self, timeout: Duration) -> io::Result<bool> {
        let millis = u16::try_from(timeout.as_millis()).unwrap_or(u16::MAX);
        let mut fds = [PollFd::new(self.master.as_fd(), PollFlags::POLLIN)];
        match poll(&mut fds, PollTimeout::from(millis)) {
            Ok(0) => Ok(false),
            Ok(_) => Ok(true),
            // A signal interrupted the wait; treat it as an elapsed timeout.
            Err(nix::errno::Errno::EINTR) => Ok(false),
            Err(e) => Err(io::Error::from(e)),
        }
    }

    fn read_chunk(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.master.read(buf)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
