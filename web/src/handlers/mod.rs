//! HTTP request handlers shared by Boxoffice services.

pub mod health;

pub use health::{health_check, readiness_check};
