//! # Boxoffice Core
//!
//! Domain types and dependency traits for the seat checkout core of an event
//! ticketing storefront.
//!
//! ## Core Concepts
//!
//! - **Seat**: one seat of one showtime, moving through
//!   `available → held → reserved → sold (→ resale_listed → reserved_for_resale → sold)`
//! - **Transition**: an atomic compare-and-swap on a seat's status, the only way
//!   seat state changes
//! - **Hold**: a time-bounded claim on seats by a shopper
//! - **Checkout session**: a payment-provider session paying for held seats,
//!   reconciled exactly once
//!
//! ## Dependency Injection
//!
//! Every external dependency is a trait ([`store::InventoryStore`],
//! [`payment::PaymentProvider`], [`environment::Clock`], ...) so the managers in
//! the `ticketing` crate run unchanged against Postgres in production and
//! in-memory fakes in tests.

use std::future::Future;
use std::pin::Pin;

pub mod collaborators;
pub mod payment;
pub mod store;
pub mod types;

// Re-export commonly used types
pub use chrono::{DateTime, Utc};
pub use serde::{Deserialize, Serialize};

/// Boxed future returned by the dyn-compatible dependency traits.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Environment module - Dependency injection traits
///
/// All external dependencies are abstracted behind traits and injected via
/// the service environments.
pub mod environment {
    use chrono::{DateTime, Utc};

    /// Clock trait - abstracts time operations for testability
    ///
    /// Hold expiry is always computed from this clock, never from the
    /// database server's time.
    ///
    /// # Examples
    ///
    /// ```
    /// use boxoffice_core::environment::{Clock, SystemClock};
    ///
    /// let clock = SystemClock;
    /// let before = chrono::Utc::now();
    /// assert!(clock.now() >= before);
    /// ```
    pub trait Clock: Send + Sync {
        /// Get the current time
        fn now(&self) -> DateTime<Utc>;
    }

    /// Production clock backed by the system time.
    #[derive(Clone, Copy, Debug, Default)]
    pub struct SystemClock;

    impl Clock for SystemClock {
        fn now(&self) -> DateTime<Utc> {
            Utc::now()
        }
    }
}
