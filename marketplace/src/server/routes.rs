//! Router configuration for the marketplace.

use super::state::AppState;
use crate::api::{admin, bookings, webhook};
use axum::{
    routing::{get, patch, post},
    Router,
};
use tourbook_web::{correlation_id_layer, health_check, readiness_check};
use tower_http::trace::TraceLayer;

/// Build the complete Axum router.
///
/// - `GET /health`, `GET /ready` (no authentication)
/// - `/api/bookings/...` (bearer token; the webhook is signed instead)
/// - `/api/admin/...` (admin bearer token)
pub fn build_router(state: AppState) -> Router {
    let api_routes = Router::new()
        .route("/bookings", post(bookings::create_booking))
        .route("/bookings/:id", get(bookings::get_booking))
        .route("/bookings/:id/payment-webhook", post(webhook::payment_webhook))
        .route("/bookings/:id/decision", patch(bookings::decide_booking))
        .route("/bookings/:id/cancel", patch(bookings::cancel_booking))
        .route("/admin/stats", get(admin::get_platform_stats))
        .route("/admin/users/:id", patch(admin::update_user_flags));

    Router::new()
        .route("/health", get(health_check))
        .route("/ready", get(readiness_check))
        .nest("/api", api_routes)
        .layer(TraceLayer::new_for_http())
        .layer(correlation_id_layer())
        .with_state(state)
}
