//! Axum integration for the tour booking marketplace.
//!
//! The marketplace keeps its business rules in reducers and services that never touch
//! HTTP. This crate is the thin shell around them:
//!
//! 1. **Extract** credentials and correlation ids from the request
//! 2. **Call** the domain service
//! 3. **Map** the result (or the error, via [`AppError`]) to a response
//!
//! # Example
//!
//! ```ignore
//! use tourbook_web::{AppError, BearerToken, WebResult};
//!
//! async fn get_booking(
//!     State(state): State<AppState>,
//!     token: BearerToken,
//!     Path(id): Path<Uuid>,
//! ) -> WebResult<Json<Booking>> {
//!     let actor = state.identity.resolve(token.as_str()).await?;
//!     Ok(Json(state.bookings.get(BookingId::from_uuid(id), &actor).await?))
//! }
//! ```

#![forbid(unsafe_code)]
#![allow(clippy::module_name_repetitions)]

pub mod error;
pub mod extractors;
pub mod handlers;
pub mod middleware;

pub use error::{AppError, ErrorBody};
pub use extractors::{BearerToken, CorrelationId};
pub use handlers::{health_check, readiness_check, ReadinessProbe};
pub use middleware::{correlation_id_layer, CorrelationIdLayer, CORRELATION_ID_HEADER};

/// Result type alias for web handlers.
pub type WebResult<T> = Result<T, AppError>;
