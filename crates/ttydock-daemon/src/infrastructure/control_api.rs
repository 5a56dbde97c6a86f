//! HTTP control surface.
//!
//! A small JSON API over the orchestration interface, for operators and the
//! web dashboard.  The handlers are pure callers of the
//! [`ServiceOrchestrator`] — they never touch the bridge, so a wedged
//! container runtime can slow this surface down without affecting the byte
//! stream.
//!
//! # Endpoints
//!
//! | Method | Path                   | Body               | Response                     |
//! |--------|------------------------|--------------------|------------------------------|
//! | GET    | `/containers`          | –                  | `{"<name>": "<status>", ...}`|
//! | POST   | `/containers/start`    | `{"name": "..."}`  | `{"message": "..."}`         |
//! | POST   | `/containers/stop`     | `{"name": "..."}`  | `{"message": "..."}`         |
//! | POST   | `/containers/stop-all` | –                  | `{"message": "..."}`         |
//! | GET    | `/status`              | –                  | bridge state snapshot        |
//!
//! Orchestrator calls are synchronous and potentially slow, so every
//! handler moves them onto the blocking thread pool.  Failures map to
//! HTTP 500 with `{"error": "..."}`.

use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::application::dispatch::{OrchestrationError, ServiceOrchestrator};
use crate::infrastructure::supervisor::SupervisorStatus;

/// Shared handler state.
#[derive(Clone)]
struct ApiState {
    orchestrator: Arc<dyn ServiceOrchestrator>,
    status: Arc<SupervisorStatus>,
    endpoint_path: String,
}

/// Request body naming one service.
#[derive(Debug, Deserialize)]
struct ServiceRequest {
    name: String,
}

/// Successful action response.
#[derive(Debug, Serialize)]
struct MessageResponse {
    message: String,
}

/// Error response body.
#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
}

/// Bridge state snapshot for `GET /status`.
#[derive(Debug, Serialize)]
struct StatusResponse {
    state: &'static str,
    generation: u64,
    failed_attempts: u64,
    endpoint: String,
}

type ApiError = (StatusCode, Json<ErrorResponse>);

/// Builds the control-surface router.
pub fn router(
    orchestrator: Arc<dyn ServiceOrchestrator>,
    status: Arc<SupervisorStatus>,
    endpoint_path: String,
) -> Router {
    let state = ApiState {
        orchestrator,
        status,
        endpoint_path,
    };
    Router::new()
        .route("/containers", get(list_containers))
        .route("/containers/start", post(start_container))
        .route("/containers/stop", post(stop_container))
        .route("/containers/stop-all", post(stop_all_containers))
        .route("/status", get(bridge_status))
        .with_state(state)
}

/// Serves the control surface on `listener` until the running flag clears.
///
/// The listener is bound by the caller so that a port conflict is a startup
/// error rather than a silently dead API.
pub async fn serve_control_api(
    listener: tokio::net::TcpListener,
    orchestrator: Arc<dyn ServiceOrchestrator>,
    status: Arc<SupervisorStatus>,
    endpoint_path: String,
    running: Arc<AtomicBool>,
) -> anyhow::Result<()> {
    let addr = listener
        .local_addr()
        .context("control API listener has no local address")?;
    info!("control API listening on {addr}");

    let app = router(orchestrator, status, endpoint_path);
    axum::serve(listener, app)
        .with_graceful_shutdown(wait_for_shutdown(running))
        .await
        .context("control API server failed")?;

    info!("control API stopped");
    Ok(())
}

/// Resolves once the running flag is cleared, checked at a bounded interval.
async fn wait_for_shutdown(running: Arc<AtomicBool>) {
    while running.load(Ordering::Relaxed) {
        tokio::time::sleep(Duration::from_millis(200)).await;
    }
}

/// Binds the control API listener; failure here is fatal at startup.
pub async fn bind_control_api(addr: SocketAddr) -> anyhow::Result<tokio::net::TcpListener> {
    tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind control API on {addr}"))
}

// ── Handlers ──────────────────────────────────────────────────────────────────

async fn list_containers(
    State(state): State<ApiState>,
) -> Result<Json<BTreeMap<String, String>>, ApiError> {
    let orchestrator = Arc::clone(&state.orchestrator);
    run_blocking(move || orchestrator.list_services())
        .await
        .map(Json)
}

async fn start_container(
    State(state): State<ApiState>,
    Json(req): Json<ServiceRequest>,
) -> Result<Json<MessageResponse>, ApiError> {
    let orchestrator = Arc::clone(&state.orchestrator);
    let message = run_blocking(move || orchestrator.start_service(&req.name)).await?;
    Ok(Json(MessageResponse { message }))
}

async fn stop_container(
    State(state): State<ApiState>,
    Json(req): Json<ServiceRequest>,
) -> Result<Json<MessageResponse>, ApiError> {
    let orchestrator = Arc::clone(&state.orchestrator);
    let message = run_blocking(move || orchestrator.stop_service(&req.name)).await?;
    Ok(Json(MessageResponse { message }))
}

async fn stop_all_containers(
    State(state): State<ApiState>,
) -> Result<Json<MessageResponse>, ApiError> {
    let orchestrator = Arc::clone(&state.orchestrator);
    let message = run_blocking(move || orchestrator.stop_all()).await?;
    Ok(Json(MessageResponse { message }))
}

async fn bridge_status(State(state): State<ApiState>) -> Json<StatusResponse> {
    Json(StatusResponse {
        state: state.status.state().as_str(),
        generation: state.status.generation(),
        failed_attempts: state.status.failed_attempts(),
        endpoint: state.endpoint_path.clone(),
    })
}

/// Runs a synchronous orchestrator call on the blocking pool and maps any
/// failure to an HTTP 500.
async fn run_blocking<T, F>(f: F) -> Result<T, ApiError>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T, OrchestrationError> + Send + 'static,
{
    match tokio::task::spawn_blocking(f).await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(e)) => Err(internal_error(e.to_string())),
        Err(e) => Err(internal_error(format!("orchestration worker failed: {e}"))),
    }
}

fn internal_error(error: String) -> ApiError {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ErrorResponse { error }),
    )
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::orchestrator::mock::MockOrchestrator;

    fn test_state(orchestrator: MockOrchestrator) -> ApiState {
        ApiState {
            orchestrator: Arc::new(orchestrator),
            status: Arc::new(SupervisorStatus::new()),
            endpoint_path: "/tmp/ttydock".to_string(),
        }
    }

    #[tokio::test]
    async fn test_list_handler_returns_the_service_map() {
        // Arrange
        let state = test_state(MockOrchestrator::with_services(&["driver"]));

        // Act
        let Json(listing) = list_containers(State(state)).await.unwrap();

        // Assert
        assert_eq!(listing["driver"], "stopped");
    }

    #[tokio::test]
    async fn test_start_handler_reports_the_outcome_message() {
        let state = test_state(MockOrchestrator::with_services(&["driver"]));

        let Json(resp) = start_container(
            State(state),
            Json(ServiceRequest {
                name: "driver".to_string(),
            }),
        )
        .await
        .unwrap();

        assert_eq!(resp.message, "started driver");
    }

    #[tokio::test]
    async fn test_stop_handler_reports_the_outcome_message() {
        let state = test_state(MockOrchestrator::with_services(&["driver"]));

        let Json(resp) = stop_container(
            State(state),
            Json(ServiceRequest {
                name: "driver".to_string(),
            }),
        )
        .await
        .unwrap();

        assert_eq!(resp.message, "stopped driver");
    }

    #[tokio::test]
    async fn test_orchestrator_failure_maps_to_http_500() {
        // Arrange
        let mut mock = MockOrchestrator::with_services(&["driver"]);
        mock.should_fail = true;
        let state = test_state(mock);

        // Act
        let result = list_containers(State(state)).await;

        // Assert
        let (status, Json(body)) = result.expect_err("must fail");
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(body.error.contains("mock failure"));
    }

    #[tokio::test]
    async fn test_stop_all_handler_covers_every_service() {
        let state = test_state(MockOrchestrator::with_services(&["a", "b"]));

        let Json(resp) = stop_all_containers(State(state)).await.unwrap();

        assert_eq!(resp.message, "stopped a\nstopped b");
    }

    #[tokio::test]
    async fn test_status_handler_reports_the_snapshot() {
        let state = test_state(MockOrchestrator::new());

        let Json(resp) = bridge_status(State(state)).await;

        assert_eq!(resp.state, "disconnected");
        assert_eq!(resp.generation, 0);
        assert_eq!(resp.endpoint, "/tmp/ttydock");
    }

    #[tokio::test]
    async fn test_wait_for_shutdown_resolves_when_flag_clears() {
        let running = Arc::new(AtomicBool::new(false));
        // Must return promptly, not hang.
        tokio::time::timeout(Duration::from_secs(1), wait_for_shutdown(running))
            .await
            .expect("shutdown wait must resolve within one poll interval");
    }

    #[test]
    fn test_router_wires_all_routes() {
        // Router construction itself validates the route table (duplicate
        // or malformed paths panic here, not at serve time).
        let _router = router(
            Arc::new(MockOrchestrator::new()),
            Arc::new(SupervisorStatus::new()),
            "/tmp/ttydock".to_string(),
        );
    }
}
