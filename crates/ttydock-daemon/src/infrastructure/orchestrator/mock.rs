//! Mock orchestrator for unit and integration testing.
//!
//! The real backend shells out to `docker compose`, which needs a container
//! runtime, compose projects on disk, and seconds of wall time per call.
//! The mock replaces all of that with in-memory recording: every start/stop
//! is pushed into a `Mutex<Vec<...>>` so tests can inspect exactly what was
//! requested and in what order.
//!
//! # `should_fail` flag
//!
//! Set `should_fail = true` to make every call return an
//! [`OrchestrationError`], for exercising the error-reporting paths without
//! a broken container runtime.

use std::collections::BTreeMap;
use std::sync::Mutex;

use crate::application::dispatch::{OrchestrationError, ServiceOrchestrator};

/// Records every orchestration call without touching a container runtime.
#[derive(Debug, Default)]
pub struct MockOrchestrator {
    /// Known services and their current status text.
    pub services: Mutex<BTreeMap<String, String>>,
    /// Names passed to `start_service`, in call order.
    pub started: Mutex<Vec<String>>,
    /// Names passed to `stop_service`, in call order.
    pub stopped: Mutex<Vec<String>>,
    /// Number of `stop_all` calls.
    pub stop_all_calls: Mutex<usize>,
    /// When `true`, every method returns an error instead of recording.
    pub should_fail: bool,
}

impl MockOrchestrator {
    /// Creates a mock with no services and `should_fail = false`.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a mock knowing the given services, all stopped.
    pub fn with_services(names: &[&str]) -> Self {
        let mock = Self::new();
        {
            let mut services = mock.services.lock().unwrap();
            for name in names {
                services.insert(name.to_string(), "stopped".to_string());
            }
        }
        mock
    }

    fn failure() -> OrchestrationError {
        OrchestrationError::CommandFailed {
            tool: "mock".to_string(),
            status: "exit status: 1".to_string(),
            stderr: "mock failure".to_string(),
        }
    }
}

impl ServiceOrchestrator for MockOrchestrator {
    fn list_services(&self) -> Result<BTreeMap<String, String>, OrchestrationError> {
        if self.should_fail {
            return Err(Self::failure());
        }
        Ok(self.services.lock().unwrap().clone())
    }

    fn start_service(&self, name: &str) -> Result<String, OrchestrationError> {
        if self.should_fail {
            return Err(Self::failure());
        }
        let mut services = self.services.lock().unwrap();
        let Some(status) = services.get_mut(name) else {
            return Err(OrchestrationError::UnknownService(name.to_string()));
        };
        *status = "running".to_string();
        self.started.lock().unwrap().push(name.to_string());
        Ok(format!("started {name}"))
    }

    fn stop_service(&self, name: &str) -> Result<String, OrchestrationError> {
        if self.should_fail {
            return Err(Self::failure());
        }
        let mut services = self.services.lock().unwrap();
        let Some(status) = services.get_mut(name) else {
            return Err(OrchestrationError::UnknownService(name.to_string()));
        };
        // Stopping an already-stopped service succeeds, matching the real
        // backend's idempotence.
        *status = "stopped".to_string();
        self.stopped.lock().unwrap().push(name.to_string());
        Ok(format!("stopped {name}"))
    }

    fn stop_all(&self) -> Result<String, OrchestrationError> {
        if self.should_fail {
            return Err(Self::failure());
        }
        *self.stop_all_calls.lock().unwrap() += 1;

        let mut services = self.services.lock().unwrap();
        if services.is_empty() {
            return Ok("no services discovered".to_string());
        }
        let lines: Vec<String> = services
            .iter_mut()
            .map(|(name, status)| {
                *status = "stopped".to_string();
                format!("stopped {name}")
            })
            .collect();
        Ok(lines.join("\n"))
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_with_services_starts_everything_stopped() {
        // Arrange / Act
        let mock = MockOrchestrator::with_services(&["a", "b"]);

        // Assert
        let listing = mock.list_services().unwrap();
        assert_eq!(listing["a"], "stopped");
        assert_eq!(listing["b"], "stopped");
    }

    #[test]
    fn test_start_updates_status_and_records_the_call() {
        let mock = MockOrchestrator::with_services(&["a"]);

        mock.start_service("a").unwrap();

        assert_eq!(mock.list_services().unwrap()["a"], "running");
        assert_eq!(mock.started.lock().unwrap().as_slice(), ["a"]);
    }

    #[test]
    fn test_unknown_service_is_rejected() {
        let mock = MockOrchestrator::new();
        assert!(matches!(
            mock.start_service("ghost"),
            Err(OrchestrationError::UnknownService(_))
        ));
    }

    #[test]
    fn test_stop_all_counts_calls_and_stops_everything() {
        let mock = MockOrchestrator::with_services(&["a", "b"]);
        mock.start_service("a").unwrap();

        let outcome = mock.stop_all().unwrap();

        assert_eq!(outcome, "stopped a\nstopped b");
        assert_eq!(*mock.stop_all_calls.lock().unwrap(), 1);
        assert_eq!(mock.list_services().unwrap()["a"], "stopped");
    }

    #[test]
    fn test_should_fail_makes_every_call_error() {
        let mut mock = MockOrchestrator::with_services(&["a"]);
        mock.should_fail = true;

        assert!(mock.list_services().is_err());
        assert!(mock.start_service("a").is_err());
        assert!(mock.stop_service("a").is_err());
        assert!(mock.stop_all().is_err());
    }
}
