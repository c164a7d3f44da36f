//! Authentication extractors.
//!
//! ```ignore
//! // Any signed-in user
//! async fn get_booking(AuthenticatedActor(actor): AuthenticatedActor) -> ... { }
//!
//! // Admins only; 401 without a credential, 403 for other roles
//! async fn get_platform_stats(RequireAdmin(admin): RequireAdmin) -> ... { }
//! ```
//!
//! Both run before the handler body, so a rejected request never reaches the domain.

use crate::identity::IdentityProvider;
use crate::types::Actor;
use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::request::Parts,
};
use std::sync::Arc;
use tourbook_web::{AppError, BearerToken};

/// The actor behind a valid bearer credential.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthenticatedActor(pub Actor);

#[async_trait]
impl<S> FromRequestParts<S> for AuthenticatedActor
where
    Arc<dyn IdentityProvider>: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let token = BearerToken::from_request_parts(parts, state).await?;
        let identity = Arc::<dyn IdentityProvider>::from_ref(state);
        let actor = identity.authenticate(token.as_str()).await?;
        Ok(Self(actor))
    }
}

/// An authenticated admin.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequireAdmin(pub Actor);

#[async_trait]
impl<S> FromRequestParts<S> for RequireAdmin
where
    Arc<dyn IdentityProvider>: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let AuthenticatedActor(actor) = AuthenticatedActor::from_request_parts(parts, state).await?;
        if !actor.is_admin() {
            tracing::warn!(actor = %actor, "Non-admin attempted an admin operation");
            return Err(AppError::forbidden("Admin role required"));
        }
        Ok(Self(actor))
    }
}
