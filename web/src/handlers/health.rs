//! Health check endpoints.
//!
//! `GET /health` is liveness only. `GET /ready` asks a [`ReadinessProbe`] (usually the
//! ledger) whether the service can take traffic.

use axum::{extract::State, http::StatusCode, Json};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tourbook_core::BoxFuture;

/// Liveness endpoint.
///
/// Returns 200 OK while the process is serving requests. Dependencies are not checked.
#[allow(clippy::unused_async)]
pub async fn health_check() -> (StatusCode, &'static str) {
    (StatusCode::OK, "ok")
}

/// Something that can report whether its backing dependency is reachable.
pub trait ReadinessProbe: Send + Sync {
    /// Name reported in the readiness body (e.g. `"ledger"`).
    fn component(&self) -> &'static str;

    /// Check the dependency. `Err` carries a short reason.
    fn check(&self) -> BoxFuture<'_, Result<(), String>>;
}

/// Readiness response body.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Readiness {
    /// Component that was probed.
    pub component: String,
    /// `"ready"` or `"unavailable"`.
    pub status: String,
    /// Failure reason, when unavailable.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Readiness endpoint.
///
/// 200 when the probe succeeds, 503 otherwise.
pub async fn readiness_check(
    State(probe): State<Arc<dyn ReadinessProbe>>,
) -> (StatusCode, Json<Readiness>) {
    let component = probe.component().to_string();
    match probe.check().await {
        Ok(()) => (
            StatusCode::OK,
            Json(Readiness {
                component,
                status: "ready".to_string(),
                message: None,
            }),
        ),
        Err(reason) => {
            tracing::warn!(component = %component, reason = %reason, "Readiness check failed");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(Readiness {
                    component,
                    status: "unavailable".to_string(),
                    message: Some(reason),
                }),
            )
        },
    }
}
