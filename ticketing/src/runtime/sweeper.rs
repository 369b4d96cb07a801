//! Background release of lapsed seat holds.
//!
//! Reads already expire holds lazily, so the sweeper only bounds how long an
//! abandoned hold lingers for seats nobody is looking at. It keeps no seat
//! state of its own; every pass is a single store call.
//!
//! # Example
//!
//! ```rust,ignore
//! let sweeper = ExpirySweeper::new(ticketing.reservations.clone(), Duration::from_secs(30));
//! let handle = sweeper.spawn(shutdown_tx.subscribe());
//! ```

use crate::app::ReservationManager;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

/// Periodic hold expiry task.
pub struct ExpirySweeper {
    reservations: ReservationManager,
    interval: Duration,
}

impl ExpirySweeper {
    /// Create a sweeper running every `interval`.
    #[must_use]
    pub const fn new(reservations: ReservationManager, interval: Duration) -> Self {
        Self { reservations, interval }
    }

    /// Spawn the sweep loop as a background task.
    ///
    /// The task exits when `shutdown` fires or its sender is dropped.
    #[must_use]
    pub fn spawn(self, shutdown: broadcast::Receiver<()>) -> JoinHandle<()> {
        tokio::spawn(self.run(shutdown))
    }

    async fn run(self, mut shutdown: broadcast::Receiver<()>) {
        info!(interval_secs = self.interval.as_secs(), "Hold expiry sweeper started");
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = shutdown.recv() => {
                    info!("Hold expiry sweeper shutting down");
                    break;
                }
                _ = ticker.tick() => {
                    self.sweep_once().await;
                }
            }
        }
    }

    /// Run a single pass. Store errors are logged and the next tick retries.
    pub async fn sweep_once(&self) -> usize {
        match self.reservations.expire_holds().await {
            Ok(released) => {
                debug!(released = released.len(), "Sweep pass complete");
                released.len()
            }
            Err(error) => {
                warn!(error = %error, "Sweep pass failed");
                0
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::app::TicketingEnvironment;
    use crate::config::ReservationConfig;
    use boxoffice_core::store::InventoryStore;
    use boxoffice_core::types::{Money, SeatCategory, SeatNo, SeatStatus};
    use boxoffice_testing::fixtures::{SeatMapBuilder, shopper, test_showtime};
    use boxoffice_testing::{InMemoryStore, ManualClock, MockPaymentProvider};
    use std::sync::Arc;

    async fn setup() -> (ReservationManager, InMemoryStore, ManualClock) {
        let store = InMemoryStore::new();
        store
            .seed_seats(
                SeatMapBuilder::new(test_showtime())
                    .category(SeatCategory::A, 1..=2, Money::from_cents(5000))
                    .build(),
            )
            .await
            .unwrap();
        let clock = ManualClock::starting_at_test_time();
        let env = TicketingEnvironment::new(
            Arc::new(clock.clone()),
            Arc::new(store.clone()),
            Arc::new(MockPaymentProvider::new()),
        );
        (
            ReservationManager::new(Arc::new(env), ReservationConfig::default()),
            store,
            clock,
        )
    }

    #[tokio::test]
    async fn test_sweep_once_releases_lapsed_holds() {
        let (reservations, store, clock) = setup().await;
        reservations
            .select_seat(&shopper("x"), &test_showtime().seat(SeatNo(1)))
            .await
            .unwrap();
        let sweeper = ExpirySweeper::new(reservations, Duration::from_secs(30));

        assert_eq!(sweeper.sweep_once().await, 0);
        clock.advance(chrono::Duration::minutes(10));
        assert_eq!(sweeper.sweep_once().await, 1);
        assert_eq!(store.count_status(&test_showtime(), SeatStatus::Available), 2);
    }

    #[tokio::test]
    async fn test_store_outage_does_not_stop_sweeper() {
        let (reservations, store, _) = setup().await;
        store.set_unavailable(true);
        let sweeper = ExpirySweeper::new(reservations, Duration::from_secs(30));
        assert_eq!(sweeper.sweep_once().await, 0);
    }

    #[tokio::test]
    async fn test_stops_on_shutdown() {
        let (reservations, _, _) = setup().await;
        let (tx, rx) = broadcast::channel(1);
        let handle = ExpirySweeper::new(reservations, Duration::from_millis(10)).spawn(rx);

        tx.send(()).unwrap();
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .unwrap()
            .unwrap();
    }
}
