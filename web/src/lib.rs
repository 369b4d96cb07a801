//! Axum integration for Boxoffice services.
//!
//! This crate holds the HTTP plumbing that is independent of any particular
//! route set: the [`AppError`] boundary type, request extractors, the
//! correlation-id middleware and health endpoints. The `ticketing` crate
//! builds its router on top of it.
//!
//! # Request Flow
//!
//! 1. **Correlation** id assigned by [`correlation_id_layer`]
//! 2. **Extract** the shopper ([`Shopper`]) and request body
//! 3. **Call** the domain service
//! 4. **Map** domain errors into [`AppError`] (`{code, message}` JSON)
//!
//! # Example
//!
//! ```ignore
//! use axum::{Router, routing::get};
//! use boxoffice_web::{Shopper, WebResult, correlation_id_layer};
//!
//! async fn whoami(shopper: Shopper) -> WebResult<String> {
//!     Ok(shopper.0.to_string())
//! }
//!
//! let app: Router = Router::new()
//!     .route("/whoami", get(whoami))
//!     .layer(correlation_id_layer());
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod error;
pub mod extractors;
pub mod handlers;
pub mod middleware;

// Re-export key types for convenience
pub use error::AppError;
pub use extractors::{CorrelationId, SHOPPER_ID_HEADER, Shopper};
pub use middleware::{CORRELATION_ID_HEADER, CorrelationIdExt, correlation_id_layer};

/// Result type alias for web handlers.
pub type WebResult<T> = Result<T, AppError>;
