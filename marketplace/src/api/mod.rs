//! HTTP API endpoints for the marketplace.
//!
//! - Bookings: create, read, guide decision, cancellation
//! - Webhook: payment confirmations signed by the payment provider
//! - Admin: platform statistics and account flags
//!
//! Domain errors are mapped to [`AppError`] here, so handlers can use `?` on service calls.

pub mod admin;
pub mod auth;
pub mod bookings;
pub mod webhook;

pub use admin::{get_platform_stats, update_user_flags};
pub use auth::{AuthenticatedActor, RequireAdmin};
pub use bookings::{cancel_booking, create_booking, decide_booking, get_booking};
pub use webhook::payment_webhook;

use crate::booking::BookingError;
use crate::identity::AuthError;
use crate::stats::StatsError;
use tourbook_web::AppError;

impl From<BookingError> for AppError {
    fn from(err: BookingError) -> Self {
        match err {
            BookingError::Validation(message) => Self::validation(message),
            BookingError::Forbidden(message) => Self::forbidden(message),
            BookingError::InvalidState(message) => Self::conflict(message),
            BookingError::NotFound { kind, id } => Self::not_found(kind, id),
            BookingError::Store(store) => store.into(),
        }
    }
}

impl From<StatsError> for AppError {
    fn from(err: StatsError) -> Self {
        Self::unavailable("stats temporarily unavailable").with_source(err)
    }
}

impl From<AuthError> for AppError {
    fn from(err: AuthError) -> Self {
        Self::unauthorized(err.to_string())
    }
}
