//! Admin endpoints.
//!
//! - GET /api/admin/stats - Platform statistics snapshot
//! - PATCH /api/admin/users/:id - Activate, deactivate or verify an account

use super::auth::RequireAdmin;
use crate::server::state::AppState;
use crate::stats::PlatformStats;
use crate::types::{User, UserFlags, UserId};
use axum::{
    extract::{Path, State},
    Json,
};
use tourbook_core::StoreError;
use tourbook_web::AppError;
use uuid::Uuid;

/// Platform statistics.
///
/// The role check runs in the extractor, so unauthenticated (401) and non-admin (403)
/// requests never issue a ledger query. Any failed aggregate answers 503.
pub async fn get_platform_stats(
    RequireAdmin(admin): RequireAdmin,
    State(state): State<AppState>,
) -> Result<Json<PlatformStats>, AppError> {
    let stats = state.stats.snapshot().await?;
    tracing::info!(admin = %admin, "Platform stats served");
    Ok(Json(stats))
}

/// Set `is_active` and/or `is_verified` on an account.
///
/// ```bash
/// curl -X PATCH http://localhost:8080/api/admin/users/<id> \
///   -H "Authorization: Bearer <admin token>" \
///   -H "Content-Type: application/json" \
///   -d '{"is_active": false}'
/// ```
pub async fn update_user_flags(
    RequireAdmin(admin): RequireAdmin,
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
    Json(flags): Json<UserFlags>,
) -> Result<Json<User>, AppError> {
    if flags.is_empty() {
        return Err(AppError::validation("Provide is_active and/or is_verified"));
    }

    let user_id = UserId::from_uuid(id);
    let user = state
        .ledger
        .update_user_flags(user_id, flags)
        .await
        .map_err(|err| match err {
            StoreError::RecordNotFound(_) => AppError::not_found("user", user_id),
            other => other.into(),
        })?;

    tracing::info!(
        admin = %admin,
        user_id = %user_id,
        is_active = user.is_active,
        is_verified = user.is_verified,
        "User flags updated"
    );
    Ok(Json(user))
}
