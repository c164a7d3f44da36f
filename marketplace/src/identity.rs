//! Who is asking.
//!
//! Sessions are issued elsewhere; this crate only turns a bearer credential into an
//! [`Actor`]. [`JwtIdentityProvider`] verifies HS256 tokens carrying `sub`, `role` and
//! `exp`. [`StaticIdentityProvider`] maps fixed tokens to actors for tests and local runs.

use crate::types::{Actor, Role, UserId};
use chrono::{DateTime, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;
use tourbook_core::BoxFuture;
use uuid::Uuid;

/// Why a credential was not accepted.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    /// No credential was presented
    #[error("missing credential")]
    MissingCredential,

    /// The credential is malformed, forged or unknown
    #[error("invalid credential")]
    InvalidToken,

    /// The credential was valid once but has expired
    #[error("credential expired")]
    Expired,
}

/// Resolves a bearer credential to an actor.
pub trait IdentityProvider: Send + Sync {
    /// Authenticate `credential`.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError`] if the credential is not accepted.
    fn authenticate<'a>(&'a self, credential: &'a str) -> BoxFuture<'a, Result<Actor, AuthError>>;
}

/// Claims carried by a session token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// User id
    pub sub: Uuid,
    /// User role
    pub role: Role,
    /// Expiry, seconds since the epoch
    pub exp: i64,
}

/// Verifies HS256 session tokens.
#[derive(Clone)]
pub struct JwtIdentityProvider {
    key: DecodingKey,
    validation: Validation,
}

impl JwtIdentityProvider {
    /// Provider verifying tokens signed with `secret`.
    #[must_use]
    pub fn new(secret: &[u8]) -> Self {
        Self {
            key: DecodingKey::from_secret(secret),
            validation: Validation::new(Algorithm::HS256),
        }
    }
}

impl std::fmt::Debug for JwtIdentityProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwtIdentityProvider")
            .field("algorithms", &self.validation.algorithms)
            .finish_non_exhaustive()
    }
}

impl IdentityProvider for JwtIdentityProvider {
    fn authenticate<'a>(&'a self, credential: &'a str) -> BoxFuture<'a, Result<Actor, AuthError>> {
        Box::pin(async move {
            if credential.is_empty() {
                return Err(AuthError::MissingCredential);
            }
            let data = jsonwebtoken::decode::<Claims>(credential, &self.key, &self.validation)
                .map_err(|e| match e.kind() {
                    ErrorKind::ExpiredSignature => AuthError::Expired,
                    _ => {
                        tracing::debug!(error = %e, "Rejected bearer token");
                        AuthError::InvalidToken
                    },
                })?;
            Ok(Actor::new(UserId::from_uuid(data.claims.sub), data.claims.role))
        })
    }
}

/// Sign a session token for `actor`, as the session service would.
///
/// # Errors
///
/// Returns [`AuthError::InvalidToken`] if the token cannot be encoded.
pub fn issue_token(secret: &[u8], actor: Actor, expires_at: DateTime<Utc>) -> Result<String, AuthError> {
    let claims = Claims {
        sub: *actor.id.as_uuid(),
        role: actor.role,
        exp: expires_at.timestamp(),
    };
    jsonwebtoken::encode(&Header::new(Algorithm::HS256), &claims, &EncodingKey::from_secret(secret))
        .map_err(|_| AuthError::InvalidToken)
}

/// Fixed token table.
#[derive(Debug, Clone, Default)]
pub struct StaticIdentityProvider {
    tokens: HashMap<String, Actor>,
}

impl StaticIdentityProvider {
    /// Empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Accept `token` as `actor`.
    #[must_use]
    pub fn with(mut self, token: impl Into<String>, actor: Actor) -> Self {
        self.tokens.insert(token.into(), actor);
        self
    }
}

impl IdentityProvider for StaticIdentityProvider {
    fn authenticate<'a>(&'a self, credential: &'a str) -> BoxFuture<'a, Result<Actor, AuthError>> {
        let result = if credential.is_empty() {
            Err(AuthError::MissingCredential)
        } else {
            self.tokens.get(credential).copied().ok_or(AuthError::InvalidToken)
        };
        Box::pin(std::future::ready(result))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chrono::Duration;

    const SECRET: &[u8] = b"test-secret";

    #[tokio::test]
    async fn valid_token_yields_actor() {
        let actor = Actor::guide(UserId::new());
        let token = issue_token(SECRET, actor, Utc::now() + Duration::hours(1)).unwrap();
        let provider = JwtIdentityProvider::new(SECRET);
        assert_eq!(provider.authenticate(&token).await, Ok(actor));
    }

    #[tokio::test]
    async fn expired_token_is_reported_as_expired() {
        let actor = Actor::tourist(UserId::new());
        let token = issue_token(SECRET, actor, Utc::now() - Duration::hours(2)).unwrap();
        let provider = JwtIdentityProvider::new(SECRET);
        assert_eq!(provider.authenticate(&token).await, Err(AuthError::Expired));
    }

    #[tokio::test]
    async fn wrong_secret_and_garbage_are_invalid() {
        let actor = Actor::admin(UserId::new());
        let token = issue_token(b"other-secret", actor, Utc::now() + Duration::hours(1)).unwrap();
        let provider = JwtIdentityProvider::new(SECRET);
        assert_eq!(provider.authenticate(&token).await, Err(AuthError::InvalidToken));
        assert_eq!(provider.authenticate("not.a.jwt").await, Err(AuthError::InvalidToken));
        assert_eq!(provider.authenticate("").await, Err(AuthError::MissingCredential));
    }

    #[tokio::test]
    async fn static_provider_lookup() {
        let actor = Actor::tourist(UserId::new());
        let provider = StaticIdentityProvider::new().with("t-1", actor);
        assert_eq!(provider.authenticate("t-1").await, Ok(actor));
        assert_eq!(provider.authenticate("t-2").await, Err(AuthError::InvalidToken));
    }
}
