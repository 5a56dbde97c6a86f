//! Endpoint-path discovery file.
//!
//! External collaborators find the virtual endpoint by reading a single
//! file containing its stable path.  The file is written once at startup
//! and removed at clean shutdown; a leftover file after a crash is simply
//! overwritten by the next run.

use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, warn};

/// Error writing the discovery file.
#[derive(Debug, Error)]
pub enum StateFileError {
    #[error("failed to write state file {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Writes `endpoint_path` (plus a trailing newline) into `path`, creating
/// parent directories as needed.
pub fn write_state_file(path: &Path, endpoint_path: &Path) -> Result<(), StateFileError> {
    let write = |path: &Path| -> io::Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        std::fs::write(path, format!("{}\n", endpoint_path.display()))
    };

    write(path).map_err(|source| StateFileError::Write {
        path: path.to_path_buf(),
        source,
    })?;
    debug!("state file written: {}", path.display());
    Ok(())
}

/// Removes the discovery file.  Best effort: a missing file is fine, any
/// other failure is logged and swallowed — shutdown must not fail over it.
pub fn remove_state_file(path: &Path) {
    match std::fs::remove_file(path) {
        Ok(()) => debug!("state file removed: {}", path.display()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => warn!("failed to remove state file {}: {e}", path.display()),
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_then_read_back_the_endpoint_path() {
        // Arrange
        let dir = tempfile::tempdir().unwrap();
        let state = dir.path().join("ttydock.state");

        // Act
        write_state_file(&state, Path::new("/tmp/ttydock")).unwrap();

        // Assert
        let contents = std::fs::read_to_string(&state).unwrap();
        assert_eq!(contents, "/tmp/ttydock\n");
    }

    #[test]
    fn test_write_creates_missing_parent_directories() {
        let dir = tempfile::tempdir().unwrap();
        let state = dir.path().join("nested/run/ttydock.state");

        write_state_file(&state, Path::new("/tmp/ttydock")).unwrap();

        assert!(state.is_file());
    }

    #[test]
    fn test_write_overwrites_a_leftover_file() {
        let dir = tempfile::tempdir().unwrap();
        let state = dir.path().join("ttydock.state");
        std::fs::write(&state, "/stale/path\n").unwrap();

        write_state_file(&state, Path::new("/tmp/fresh")).unwrap();

        assert_eq!(std::fs::read_to_string(&state).unwrap(), "/tmp/fresh\n");
    }

    #[test]
    fn test_remove_is_silent_when_the_file_is_already_gone() {
        let dir = tempfile::tempdir().unwrap();
        // Must not panic or log an error-level event.
        remove_state_file(&dir.path().join("never-written"));
    }

    #[test]
    fn test_remove_deletes_the_file() {
        let dir = tempfile::tempdir().unwrap();
        let state = dir.path().join("ttydock.state");
        write_state_file(&state, Path::new("/tmp/ttydock")).unwrap();

        remove_state_file(&state);

        assert!(!state.exists());
    }

    #[test]
    fn test_unwritable_location_reports_write_error() {
        let result = write_state_file(
            Path::new("/proc/ttydock-cannot-write-here/state"),
            Path::new("/tmp/ttydock"),
        );
        assert!(matches!(result, Err(StateFileError::Write { .. })));
    }
}
