//! Custom Axum extractors.
//!
//! - [`CorrelationId`]: the request's correlation id (from the middleware, a header, or fresh)
//! - [`BearerToken`]: the raw credential from `Authorization: Bearer <token>`
//!
//! Resolving a token into an actor is domain work and lives with the identity provider.

use crate::error::AppError;
use crate::middleware::CORRELATION_ID_HEADER;
use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts},
};
use uuid::Uuid;

/// Correlation ID for request tracing.
///
/// Prefers the id the correlation middleware stored in the request extensions, then a
/// valid `X-Correlation-ID` header, and otherwise generates a new UUID v4.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CorrelationId(pub Uuid);

#[async_trait]
impl<S> FromRequestParts<S> for CorrelationId
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        if let Some(id) = parts.extensions.get::<Uuid>() {
            return Ok(Self(*id));
        }

        let correlation_id = parts
            .headers
            .get(CORRELATION_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .and_then(|s| Uuid::parse_str(s).ok())
            .unwrap_or_else(Uuid::new_v4);

        Ok(Self(correlation_id))
    }
}

/// Bearer token extracted from the `Authorization` header.
///
/// Rejects with 401 when the header is missing, is not a bearer credential, or is empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BearerToken(pub String);

impl BearerToken {
    /// Parse a raw `Authorization` header value.
    ///
    /// # Errors
    ///
    /// Returns an unauthorized [`AppError`] if the value is not `Bearer <token>`.
    pub fn parse(header: &str) -> Result<Self, AppError> {
        let token = header
            .strip_prefix("Bearer ")
            .ok_or_else(|| AppError::unauthorized("Expected 'Authorization: Bearer <token>'"))?
            .trim();

        if token.is_empty() {
            return Err(AppError::unauthorized("Empty bearer token"));
        }

        Ok(Self(token.to_string()))
    }

    /// The token text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for BearerToken
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .ok_or_else(|| AppError::unauthorized("Missing authorization header"))?;

        Self::parse(header)
    }
}

#[cfg(test)]
#[allow(clippy::expect_used)]
mod tests {
    use super::*;
    use axum::http::{Request, StatusCode};

    fn parts(builder: axum::http::request::Builder) -> Parts {
        builder.body(()).expect("Valid request").into_parts().0
    }

    #[tokio::test]
    async fn test_correlation_id_from_header() {
        let uuid = Uuid::new_v4();
        let mut parts = parts(Request::builder().header(CORRELATION_ID_HEADER, uuid.to_string()));

        let correlation_id = CorrelationId::from_request_parts(&mut parts, &())
            .await
            .expect("Should extract");

        assert_eq!(correlation_id.0, uuid);
    }

    #[tokio::test]
    async fn correlation_id_prefers_extension() {
        let from_middleware = Uuid::new_v4();
        let mut parts = parts(
            Request::builder().header(CORRELATION_ID_HEADER, Uuid::new_v4().to_string()),
        );
        parts.extensions.insert(from_middleware);

        let correlation_id = CorrelationId::from_request_parts(&mut parts, &())
            .await
            .expect("Should extract");

        assert_eq!(correlation_id.0, from_middleware);
    }

    #[tokio::test]
    async fn test_correlation_id_generates_new() {
        let mut parts = parts(Request::builder());
        let correlation_id = CorrelationId::from_request_parts(&mut parts, &())
            .await
            .expect("Should extract");

        assert_ne!(correlation_id.0, Uuid::nil());
    }

    #[tokio::test]
    async fn bearer_token_extracted() {
        let mut parts = parts(Request::builder().header(AUTHORIZATION, "Bearer abc.def.ghi"));
        let token = BearerToken::from_request_parts(&mut parts, &())
            .await
            .expect("Should extract");

        assert_eq!(token.as_str(), "abc.def.ghi");
    }

    #[tokio::test]
    async fn missing_header_is_unauthorized() {
        let mut parts = parts(Request::builder());
        let err = BearerToken::from_request_parts(&mut parts, &())
            .await
            .expect_err("Should reject");

        assert_eq!(err.status(), StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn wrong_scheme_and_empty_token_rejected() {
        assert!(BearerToken::parse("Basic dXNlcjpwYXNz").is_err());
        assert!(BearerToken::parse("Bearer ").is_err());
        assert!(BearerToken::parse("Bearer    ").is_err());
    }
}
