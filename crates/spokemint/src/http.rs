//! the agent's http surface.

use std::time::Duration;

use axum::extract::State;
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;
use spokemint_hub::RequestStore;
use tokio::time::timeout;

/// content-type for health responses (rfc 8040 style health+json).
const HEALTH_CONTENT_TYPE: &str = "application/health+json; charset=utf-8";

/// deadline for the hub ping inside the health check.
const PING_TIMEOUT: Duration = Duration::from_secs(1);

/// health check response body.
#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
}

/// build the agent router. just `/healthz` for now.
pub fn router<H>(hub: H) -> Router
where
    H: RequestStore + Clone + Send + Sync + 'static,
{
    Router::new()
        .route("/healthz", get(health::<H>))
        .with_state(hub)
}

/// GET /healthz
///
/// answers `{"status": "pass"}` while the hub can be listed within one
/// second, `{"status": "fail"}` with a 500 otherwise.
async fn health<H>(State(hub): State<H>) -> Response
where
    H: RequestStore + Clone + Send + Sync + 'static,
{
    let ping = timeout(PING_TIMEOUT, hub.list()).await;

    let (status_code, health_status) = match ping {
        Ok(Ok(_)) => (StatusCode::OK, "pass"),
        Ok(Err(_)) | Err(_) => (StatusCode::INTERNAL_SERVER_ERROR, "fail"),
    };

    (
        status_code,
        [(header::CONTENT_TYPE, HEALTH_CONTENT_TYPE)],
        Json(HealthResponse {
            status: health_status,
        }),
    )
        .into_response()
}
