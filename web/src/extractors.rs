//! Custom Axum extractors.
//!
//! - [`Shopper`]: the shopper identity forwarded by the auth proxy
//! - [`CorrelationId`]: the request correlation id set by the middleware
//!
//! # Examples
//!
//! ```ignore
//! use boxoffice_web::extractors::{CorrelationId, Shopper};
//!
//! async fn handler(shopper: Shopper, correlation_id: CorrelationId) -> String {
//!     format!("{} / {}", shopper.0, correlation_id.0)
//! }
//! ```

use crate::error::AppError;
use crate::middleware::CORRELATION_ID_HEADER;
use axum::{async_trait, extract::FromRequestParts, http::request::Parts};
use boxoffice_core::types::ShopperId;
use uuid::Uuid;

/// Header carrying the authenticated shopper id.
///
/// Authentication itself happens upstream; requests reaching this service
/// have already been authenticated and carry the shopper (or anonymous
/// session) id in this header.
pub const SHOPPER_ID_HEADER: &str = "X-Shopper-Id";

/// The shopper making the request.
///
/// Rejects with `401 UNAUTHORIZED` when the header is missing or blank.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Shopper(pub ShopperId);

#[async_trait]
impl<S> FromRequestParts<S> for Shopper
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .headers
            .get(SHOPPER_ID_HEADER)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.parse::<ShopperId>().ok())
            .map(Self)
            .ok_or_else(|| AppError::unauthorized(format!("Missing {SHOPPER_ID_HEADER} header")))
    }
}

/// Correlation ID for request tracing.
///
/// Read from the request extensions populated by
/// [`correlation_id_layer`](crate::middleware::correlation_id_layer), falling
/// back to the `X-Correlation-ID` header, or a fresh UUID.
#[derive(Debug, Clone, Copy)]
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

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use axum::http::{Request, StatusCode};

    async fn extract_shopper(header: Option<&str>) -> Result<Shopper, AppError> {
        let mut builder = Request::builder().uri("/selection");
        if let Some(value) = header {
            builder = builder.header(SHOPPER_ID_HEADER, value);
        }
        let (mut parts, ()) = builder.body(()).unwrap().into_parts();
        Shopper::from_request_parts(&mut parts, &()).await
    }

    #[tokio::test]
    async fn test_shopper_from_header() {
        let shopper = extract_shopper(Some("user-42")).await.unwrap();
        assert_eq!(shopper.0, ShopperId::new("user-42"));
    }

    #[tokio::test]
    async fn test_missing_or_blank_shopper_is_unauthorized() {
        for header in [None, Some("   ")] {
            let err = extract_shopper(header).await.unwrap_err();
            assert_eq!(err.status(), StatusCode::UNAUTHORIZED);
        }
    }

    #[tokio::test]
    async fn test_correlation_id_prefers_extension() {
        let id = Uuid::new_v4();
        let (mut parts, ()) = Request::builder().body(()).unwrap().into_parts();
        parts.extensions.insert(id);

        let extracted = CorrelationId::from_request_parts(&mut parts, &()).await.unwrap();
        assert_eq!(extracted.0, id);
    }
}
