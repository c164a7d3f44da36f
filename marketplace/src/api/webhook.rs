//! Payment provider webhook.
//!
//! POST /api/bookings/:id/payment-webhook
//!
//! The provider signs the raw request body with HMAC-SHA256 using the shared
//! `PAYMENT_WEBHOOK_SECRET` and sends the lowercase hex digest in `X-Payment-Signature`.
//! There is no user session on this route; the signature is the credential.
//!
//! The signed body names the booking and the amount charged. A delivery whose booking id
//! differs from the one in the path is rejected, so a signed body cannot be replayed
//! against another booking. A reference that already paid for one booking cannot pay for
//! a second.
//!
//! Providers retry deliveries, so the same confirmation may arrive several times. The
//! booking service treats a repeated reference as a no-op and this handler answers 200
//! either way.

use crate::server::state::AppState;
use crate::types::{Booking, BookingId, Money, PaymentReference};
use axum::{
    body::Bytes,
    extract::{Path, State},
    http::HeaderMap,
    Json,
};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use thiserror::Error;
use tourbook_web::AppError;
use uuid::Uuid;

/// Header carrying the hex HMAC of the body.
pub const SIGNATURE_HEADER: &str = "X-Payment-Signature";

type HmacSha256 = Hmac<Sha256>;

/// Why a webhook delivery was rejected.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WebhookError {
    /// No signature header
    #[error("missing {SIGNATURE_HEADER} header")]
    MissingSignature,

    /// The signature does not match the body
    #[error("invalid webhook signature")]
    InvalidSignature,

    /// The body is not a payment confirmation
    #[error("invalid webhook payload: {0}")]
    InvalidPayload(String),

    /// The body confirms a payment for a different booking than the one addressed
    #[error("payment confirmation is for booking {confirmed}, not {addressed}")]
    BookingMismatch {
        /// Booking id in the path
        addressed: Uuid,
        /// Booking id in the signed body
        confirmed: Uuid,
    },
}

impl From<WebhookError> for AppError {
    fn from(err: WebhookError) -> Self {
        match err {
            WebhookError::MissingSignature | WebhookError::InvalidSignature => {
                Self::unauthorized(err.to_string())
            },
            WebhookError::InvalidPayload(_) | WebhookError::BookingMismatch { .. } => {
                Self::bad_request(err.to_string())
            },
        }
    }
}

/// A payment confirmation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentConfirmation {
    /// Booking the payment was made for
    pub booking_id: Uuid,
    /// Provider's reference for the payment
    pub payment_reference: String,
    /// Amount charged, in cents
    pub amount_cents: u64,
}

/// Hex HMAC-SHA256 of `body` under `secret`.
///
/// # Errors
///
/// Returns [`WebhookError::InvalidSignature`] if the key is rejected by the MAC.
pub fn sign(secret: &[u8], body: &[u8]) -> Result<String, WebhookError> {
    let mut mac =
        HmacSha256::new_from_slice(secret).map_err(|_| WebhookError::InvalidSignature)?;
    mac.update(body);
    Ok(hex::encode(mac.finalize().into_bytes()))
}

/// Check `signature` (hex) against the HMAC of `body`. Comparison is constant time.
///
/// # Errors
///
/// Returns [`WebhookError::InvalidSignature`] if the signature does not match.
pub fn verify_signature(secret: &[u8], body: &[u8], signature: &str) -> Result<(), WebhookError> {
    let expected = sign(secret, body)?;
    let provided = signature.trim().to_ascii_lowercase();
    if constant_time_eq::constant_time_eq(expected.as_bytes(), provided.as_bytes()) {
        Ok(())
    } else {
        Err(WebhookError::InvalidSignature)
    }
}

/// Record a payment confirmed by the provider.
///
/// Signature failures answer 401, an unparseable body or a body for another booking 400,
/// then the usual booking errors (404 unknown booking, 422 amount mismatch, 409 not
/// awaiting payment or reference already used).
pub async fn payment_webhook(
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<Booking>, AppError> {
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|value| value.to_str().ok())
        .ok_or(WebhookError::MissingSignature)?;

    if let Err(err) = verify_signature(&state.webhook_secret, &body, signature) {
        tracing::warn!(booking_id = %id, "Rejected payment webhook with a bad signature");
        return Err(err.into());
    }

    let confirmation: PaymentConfirmation = serde_json::from_slice(&body)
        .map_err(|e| WebhookError::InvalidPayload(e.to_string()))?;
    if confirmation.booking_id != id {
        tracing::warn!(
            booking_id = %id,
            confirmed_booking_id = %confirmation.booking_id,
            "Rejected payment webhook addressed to another booking"
        );
        return Err(WebhookError::BookingMismatch {
            addressed: id,
            confirmed: confirmation.booking_id,
        }
        .into());
    }

    let booking = state
        .bookings
        .confirm_payment(
            BookingId::from_uuid(id),
            PaymentReference::new(confirmation.payment_reference),
            Money::from_cents(confirmation.amount_cents),
        )
        .await?;
    Ok(Json(booking))
}
