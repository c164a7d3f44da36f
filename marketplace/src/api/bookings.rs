//! Booking API endpoints.
//!
//! - POST /api/bookings - Book a tour (tourist)
//! - GET /api/bookings/:id - Booking details (participants and admins)
//! - PATCH /api/bookings/:id/decision - Accept or decline a paid booking (guide)
//! - PATCH /api/bookings/:id/cancel - Cancel (tourist, guide or admin)
//!
//! Every response carries the full booking, settlement included once there is one.

use super::auth::AuthenticatedActor;
use crate::booking::CreateBooking;
use crate::server::state::AppState;
use crate::types::{Booking, BookingId, Decision};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use tourbook_web::{AppError, CorrelationId};
use uuid::Uuid;

/// Body of a guide decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecisionRequest {
    /// `accept` or `decline`
    pub decision: Decision,
}

/// Book a tour.
///
/// # Example
///
/// ```bash
/// curl -X POST http://localhost:8080/api/bookings \
///   -H "Authorization: Bearer <token>" \
///   -H "Content-Type: application/json" \
///   -d '{
///     "guide_id": "8d6c2a1e-6f1b-4a7e-9a43-2f0b7f1d9c11",
///     "tour_id": "c1f7e2b4-3a9d-4c6e-8b21-5d4e3f2a1b0c",
///     "date": "2025-07-01T09:00:00Z",
///     "number_of_people": 2
///   }'
/// ```
pub async fn create_booking(
    AuthenticatedActor(actor): AuthenticatedActor,
    CorrelationId(correlation_id): CorrelationId,
    State(state): State<AppState>,
    Json(request): Json<CreateBooking>,
) -> Result<(StatusCode, Json<Booking>), AppError> {
    tracing::debug!(%correlation_id, actor = %actor, tour_id = %request.tour_id, "Create booking");
    let booking = state.bookings.create(actor, request).await?;
    Ok((StatusCode::CREATED, Json(booking)))
}

/// Booking details.
pub async fn get_booking(
    AuthenticatedActor(actor): AuthenticatedActor,
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
) -> Result<Json<Booking>, AppError> {
    let booking = state.bookings.get(BookingId::from_uuid(id), actor).await?;
    Ok(Json(booking))
}

/// The guide accepts or declines a paid booking.
///
/// ```bash
/// curl -X PATCH http://localhost:8080/api/bookings/<id>/decision \
///   -H "Authorization: Bearer <token>" \
///   -H "Content-Type: application/json" \
///   -d '{"decision": "accept"}'
/// ```
pub async fn decide_booking(
    AuthenticatedActor(actor): AuthenticatedActor,
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
    Json(request): Json<DecisionRequest>,
) -> Result<Json<Booking>, AppError> {
    let booking = state
        .bookings
        .guide_decision(BookingId::from_uuid(id), actor, request.decision)
        .await?;
    Ok(Json(booking))
}

/// Cancel a booking. The refund follows from who cancels and how close the tour is.
pub async fn cancel_booking(
    AuthenticatedActor(actor): AuthenticatedActor,
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
) -> Result<Json<Booking>, AppError> {
    let booking = state.bookings.cancel(BookingId::from_uuid(id), actor).await?;
    Ok(Json(booking))
}
