//! # Boxoffice Testing
//!
//! Testing utilities and helpers for Boxoffice.
//!
//! This crate provides:
//! - Mock implementations of Environment traits (clocks, payment provider, collaborators)
//! - [`InMemoryStore`], an in-memory implementation of every store trait
//! - [`ContendedInventory`], for losing a seat part way through a multi-seat operation
//! - Seat map fixtures
//! - Property-based testing strategies
//!
//! ## Example
//!
//! ```
//! use boxoffice_testing::{InMemoryStore, ManualClock, fixtures::{SeatMapBuilder, test_showtime}};
//! use boxoffice_core::environment::Clock;
//! use boxoffice_core::types::{Money, SeatCategory};
//!
//! let clock = ManualClock::starting_at_test_time();
//! let seats = SeatMapBuilder::new(test_showtime())
//!     .category(SeatCategory::A, 1..=10, Money::from_cents(8000))
//!     .build();
//! assert_eq!(seats.len(), 10);
//!
//! clock.advance(chrono::Duration::minutes(5));
//! assert!(clock.now() > boxoffice_testing::test_clock().now());
//! ```

use boxoffice_core::environment::Clock;
use chrono::{DateTime, Utc};

mod contention;
mod memory_store;
mod payment_mocks;

pub use contention::ContendedInventory;
pub use memory_store::InMemoryStore;
pub use payment_mocks::{MockPaymentProvider, RecordingLedger, RecordingTicketPublisher};

/// Mock implementations of Environment traits
pub mod mocks {
    use super::{Clock, DateTime, Utc};
    use std::sync::{Arc, RwLock};

    /// Fixed clock for deterministic tests
    ///
    /// Always returns the same time, making tests reproducible.
    ///
    /// # Example
    ///
    /// ```
    /// use boxoffice_testing::mocks::FixedClock;
    /// use boxoffice_core::environment::Clock;
    /// use chrono::Utc;
    ///
    /// let clock = FixedClock::new(Utc::now());
    /// let time1 = clock.now();
    /// let time2 = clock.now();
    /// assert_eq!(time1, time2); // Always the same!
    /// ```
    #[derive(Debug, Clone)]
    pub struct FixedClock {
        time: DateTime<Utc>,
    }

    impl FixedClock {
        /// Create a new fixed clock with the given time
        #[must_use]
        pub const fn new(time: DateTime<Utc>) -> Self {
            Self { time }
        }
    }

    impl Clock for FixedClock {
        fn now(&self) -> DateTime<Utc> {
            self.time
        }
    }

    /// Clock that only moves when told to.
    ///
    /// Clones share the same time, so a test can keep one handle and give the
    /// other to the code under test.
    #[derive(Debug, Clone)]
    pub struct ManualClock {
        time: Arc<RwLock<DateTime<Utc>>>,
    }

    impl ManualClock {
        /// Create a clock stopped at `time`
        #[must_use]
        pub fn new(time: DateTime<Utc>) -> Self {
            Self {
                time: Arc::new(RwLock::new(time)),
            }
        }

        /// Create a clock stopped at [`test_clock`]'s time
        #[must_use]
        pub fn starting_at_test_time() -> Self {
            Self::new(test_clock().now())
        }

        /// Move the clock forward.
        ///
        /// # Panics
        ///
        /// Panics if the lock is poisoned.
        #[allow(clippy::unwrap_used)]
        pub fn advance(&self, by: chrono::Duration) {
            let mut time = self.time.write().unwrap();
            *time += by;
        }

        /// Jump to an absolute time.
        ///
        /// # Panics
        ///
        /// Panics if the lock is poisoned.
        #[allow(clippy::unwrap_used)]
        pub fn set(&self, to: DateTime<Utc>) {
            *self.time.write().unwrap() = to;
        }
    }

    impl Clock for ManualClock {
        #[allow(clippy::unwrap_used)]
        fn now(&self) -> DateTime<Utc> {
            *self.time.read().unwrap()
        }
    }

    /// Create a default fixed clock for tests (2025-01-01 00:00:00 UTC)
    ///
    /// # Panics
    ///
    /// This function will panic if the hardcoded timestamp fails to parse,
    /// which should never happen in practice.
    #[must_use]
    #[allow(clippy::expect_used)]
    pub fn test_clock() -> FixedClock {
        FixedClock::new(
            DateTime::parse_from_rfc3339("2025-01-01T00:00:00Z")
                .expect("hardcoded timestamp should always parse")
                .with_timezone(&Utc),
        )
    }
}

/// Seat map and shopper fixtures.
pub mod fixtures {
    use super::Clock;
    use crate::mocks::test_clock;
    use boxoffice_core::types::{
        Attendee, EventId, Money, Seat, SeatCategory, SeatNo, ShopperId, Showtime,
    };
    use std::ops::RangeInclusive;

    /// Showtime used across tests: `evt-concert`, thirty days after [`test_clock`].
    #[must_use]
    pub fn test_showtime() -> Showtime {
        Showtime::new(
            EventId::new("evt-concert"),
            test_clock().now() + chrono::Duration::days(30),
        )
    }

    /// Shopper with the given id.
    #[must_use]
    pub fn shopper(id: &str) -> ShopperId {
        ShopperId::new(id)
    }

    /// A valid attendee, distinguished by `n`.
    #[must_use]
    pub fn attendee(n: u32) -> Attendee {
        Attendee {
            name: format!("Attendee {n}"),
            email: format!("attendee{n}@example.com"),
            phone: format!("+659100{n:04}"),
        }
    }

    /// Builds the seat map of one showtime, category by category.
    ///
    /// ```
    /// use boxoffice_testing::fixtures::{SeatMapBuilder, test_showtime};
    /// use boxoffice_core::types::{Money, SeatCategory};
    ///
    /// let seats = SeatMapBuilder::new(test_showtime())
    ///     .category(SeatCategory::A, 1..=5, Money::from_cents(12000))
    ///     .category(SeatCategory::B, 6..=20, Money::from_cents(8000))
    ///     .build();
    /// assert_eq!(seats.len(), 20);
    /// ```
    #[derive(Debug, Clone)]
    pub struct SeatMapBuilder {
        showtime: Showtime,
        seats: Vec<Seat>,
    }

    impl SeatMapBuilder {
        /// Start an empty map for `showtime`
        #[must_use]
        pub const fn new(showtime: Showtime) -> Self {
            Self {
                showtime,
                seats: Vec::new(),
            }
        }

        /// Add seats `numbers` in `category` at `price`.
        #[must_use]
        pub fn category(mut self, category: SeatCategory, numbers: RangeInclusive<u32>, price: Money) -> Self {
            for no in numbers {
                self.seats
                    .push(Seat::new(self.showtime.seat(SeatNo(no)), category, price));
            }
            self
        }

        /// Finish the map
        #[must_use]
        pub fn build(self) -> Vec<Seat> {
            self.seats
        }
    }
}

/// Property-based testing utilities using proptest.
pub mod properties {
    use boxoffice_core::types::{Money, SeatNo};
    use proptest::prelude::*;

    /// Prices between 1.00 and 500.00.
    pub fn ticket_price() -> impl Strategy<Value = Money> {
        (100u64..=50_000).prop_map(Money::from_cents)
    }

    /// Distinct seat numbers drawn from `1..=max`, at most `len` of them.
    pub fn distinct_seats(max: u32, len: usize) -> impl Strategy<Value = Vec<SeatNo>> {
        proptest::collection::btree_set(1..=max, 1..=len)
            .prop_map(|set| set.into_iter().map(SeatNo).collect())
    }
}

/// Install a test-friendly tracing subscriber.
///
/// Safe to call from every test; only the first call installs.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_test_writer()
        .try_init();
}

// Re-export commonly used items
pub use mocks::{FixedClock, ManualClock, test_clock};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixed_clock() {
        let clock = test_clock();
        let time1 = clock.now();
        let time2 = clock.now();
        assert_eq!(time1, time2);
    }

    #[test]
    fn test_manual_clock_shares_time_between_clones() {
        let clock = ManualClock::starting_at_test_time();
        let handle = clock.clone();
        handle.advance(chrono::Duration::minutes(15));
        assert_eq!(clock.now(), test_clock().now() + chrono::Duration::minutes(15));
    }
}
