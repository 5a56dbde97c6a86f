//! `docker compose` orchestration backend.
//!
//! Service groups are discovered on disk: every immediate subdirectory of
//! the compose root that contains a compose file is one service, named
//! after the directory.  Discovery runs on every call so dropping a new
//! project directory in place is picked up without a restart.
//!
//! All invocations are synchronous `docker compose` child processes.
//! Dispatch runs on the inbound pump's thread of control, so there is
//! nothing to gain from async process handling here — and the HTTP handlers
//! wrap these calls in `spawn_blocking`.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::process::Command;

use tracing::{debug, info};

use crate::application::dispatch::{OrchestrationError, ServiceOrchestrator};

/// Compose file names recognized during discovery, in precedence order.
const COMPOSE_FILE_NAMES: &[&str] = &[
    "docker-compose.yml",
    "docker-compose.yaml",
    "compose.yml",
    "compose.yaml",
];

/// Orchestrates discovered compose projects through the `docker` CLI.
#[derive(Debug, Clone)]
pub struct ComposeOrchestrator {
    compose_root: PathBuf,
}

impl ComposeOrchestrator {
    pub fn new(compose_root: PathBuf) -> Self {
        Self { compose_root }
    }

    /// Scans the compose root for service directories.
    ///
    /// Returns service name → compose file path.  Non-directories and
    /// directories without a compose file are skipped silently; they are
    /// simply not services.
    pub fn discover(&self) -> Result<BTreeMap<String, PathBuf>, OrchestrationError> {
        let entries =
            std::fs::read_dir(&self.compose_root).map_err(|source| OrchestrationError::Discovery {
                path: self.compose_root.clone(),
                source,
            })?;

        let mut services = BTreeMap::new();
        for entry in entries.flatten() {
            let dir = entry.path();
            if !dir.is_dir() {
                continue;
            }
            let Some(name) = dir.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            if let Some(file) = COMPOSE_FILE_NAMES
                .iter()
                .map(|f| dir.join(f))
                .find(|candidate| candidate.is_file())
            {
                services.insert(name.to_string(), file);
            }
        }

        debug!(count = services.len(), "discovered compose services");
        Ok(services)
    }

    fn compose_file(&self, name: &str) -> Result<PathBuf, OrchestrationError> {
        self.discover()?
            .remove(name)
            .ok_or_else(|| OrchestrationError::UnknownService(name.to_string()))
    }

    /// Runs `docker compose -f <file> <args...>` and returns its stdout.
    fn run_compose(&self, file: &Path, args: &[&str]) -> Result<String, OrchestrationError> {
        let output = Command::new("docker")
            .arg("compose")
            .arg("-f")
            .arg(file)
            .args(args)
            .output()
            .map_err(|source| OrchestrationError::Spawn {
                tool: "docker compose".to_string(),
                source,
            })?;

        if !output.status.success() {
            return Err(OrchestrationError::CommandFailed {
                tool: "docker compose".to_string(),
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

impl ServiceOrchestrator for ComposeOrchestrator {
    fn list_services(&self) -> Result<BTreeMap<String, String>, OrchestrationError> {
        let mut listing = BTreeMap::new();
        for (name, file) in self.discover()? {
            // One broken project must not hide the rest of the listing.
            let status = match self.run_compose(&file, &["ps", "-q"]) {
                Ok(stdout) if stdout.trim().is_empty() => "stopped".to_string(),
                Ok(_) => "running".to_string(),
                Err(e) => format!("error: {e}"),
            };
            listing.insert(name, status);
        }
        Ok(listing)
    }

    fn start_service(&self, name: &str) -> Result<String, OrchestrationError> {
        let file = self.compose_file(name)?;
        self.run_compose(&file, &["up", "-d"])?;
        info!(service = name, "service started");
        Ok(format!("started {name}"))
    }

    fn stop_service(&self, name: &str) -> Result<String, OrchestrationError> {
        let file = self.compose_file(name)?;
        // `down` on an already-stopped project exits 0, so stop is
        // idempotent by construction.
        self.run_compose(&file, &["down"])?;
        info!(service = name, "service stopped");
        Ok(format!("stopped {name}"))
    }

    fn stop_all(&self) -> Result<String, OrchestrationError> {
        let services = self.discover()?;
        if services.is_empty() {
            return Ok("no services discovered".to_string());
        }

        let mut lines = Vec::with_capacity(services.len());
        for (name, file) in services {
            match self.run_compose(&file, &["down"]) {
                Ok(_) => lines.push(format!("stopped {name}")),
                Err(e) => lines.push(format!("error stopping {name}: {e}")),
            }
        }
        Ok(lines.join("\n"))
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
//
// These tests cover discovery only.  Invocation paths run the real `docker`
// binary and are exercised against live deployments, not in unit tests.

#[cfg(test)]
mod tests {
    use super::*;

    /// Builds a compose root with the given `(dir, file)` pairs.
    fn compose_tree(entries: &[(&str, &str)]) -> tempfile::TempDir {
        let root = tempfile::tempdir().expect("tempdir");
        for (dir, file) in entries {
            let dir_path = root.path().join(dir);
            std::fs::create_dir_all(&dir_path).unwrap();
            if !file.is_empty() {
                std::fs::write(dir_path.join(file), "services: {}\n").unwrap();
            }
        }
        root
    }

    #[test]
    fn test_discover_finds_each_service_directory() {
        // Arrange
        let root = compose_tree(&[
            ("driver", "docker-compose.yml"),
            ("logger", "compose.yaml"),
        ]);
        let orchestrator = ComposeOrchestrator::new(root.path().to_path_buf());

        // Act
        let services = orchestrator.discover().unwrap();

        // Assert
        assert_eq!(
            services.keys().collect::<Vec<_>>(),
            ["driver", "logger"]
        );
        assert!(services["driver"].ends_with("driver/docker-compose.yml"));
        assert!(services["logger"].ends_with("logger/compose.yaml"));
    }

    #[test]
    fn test_discover_skips_directories_without_compose_files() {
        let root = compose_tree(&[("driver", "docker-compose.yml"), ("notes", "")]);
        let orchestrator = ComposeOrchestrator::new(root.path().to_path_buf());

        let services = orchestrator.discover().unwrap();

        assert_eq!(services.len(), 1);
        assert!(!services.contains_key("notes"));
    }

    #[test]
    fn test_discover_skips_plain_files_in_the_root() {
        let root = compose_tree(&[("driver", "docker-compose.yml")]);
        std::fs::write(root.path().join("README.md"), "not a service").unwrap();
        let orchestrator = ComposeOrchestrator::new(root.path().to_path_buf());

        let services = orchestrator.discover().unwrap();

        assert_eq!(services.len(), 1);
    }

    #[test]
    fn test_discover_prefers_the_canonical_file_name() {
        // Both names present: docker-compose.yml wins.
        let root = compose_tree(&[("driver", "docker-compose.yml")]);
        std::fs::write(
            root.path().join("driver").join("compose.yaml"),
            "services: {}\n",
        )
        .unwrap();
        let orchestrator = ComposeOrchestrator::new(root.path().to_path_buf());

        let services = orchestrator.discover().unwrap();

        assert!(services["driver"].ends_with("docker-compose.yml"));
    }

    #[test]
    fn test_discover_on_missing_root_reports_discovery_error() {
        let orchestrator =
            ComposeOrchestrator::new(PathBuf::from("/no/such/compose/root"));

        let result = orchestrator.discover();

        assert!(matches!(
            result,
            Err(OrchestrationError::Discovery { .. })
        ));
    }

    #[test]
    fn test_unknown_service_lookup_fails_by_name() {
        let root = compose_tree(&[("driver", "docker-compose.yml")]);
        let orchestrator = ComposeOrchestrator::new(root.path().to_path_buf());

        let result = orchestrator.compose_file("missing");

        match result {
            Err(OrchestrationError::UnknownService(name)) => assert_eq!(name, "missing"),
            other => panic!("expected UnknownService, got {other:?}"),
        }
    }

    #[test]
    fn test_stop_all_with_no_services_reports_success() {
        // Arrange: an empty compose root.
        let root = compose_tree(&[]);
        let orchestrator = ComposeOrchestrator::new(root.path().to_path_buf());

        // Act
        let outcome = orchestrator.stop_all().unwrap();

        // Assert: success text, not an error — stop-all is idempotent even
        // over nothing.
        assert_eq!(outcome, "no services discovered");
    }
}
