//! Seat selection: turning a shopper's picks into time-bounded holds.
//!
//! # State machine
//!
//! ```text
//! available ──select──► held ──checkout──► reserved ──verify──► sold
//!     ▲                  │                    │
//!     └──── deselect ────┘                    │
//!     └──────────────── expiry ◄──────────────┘
//! ```
//!
//! All holds of one shopper in a showtime share a single expiry: the first
//! seat starts the window, later seats join it without extending it.

use super::TicketingEnvironment;
use crate::config::ReservationConfig;
use crate::error::{TicketingError, TicketingResult};
use crate::metrics;
use boxoffice_core::store::{SeatTransition, StoreError};
use boxoffice_core::types::{Hold, Seat, SeatKey, SeatStatus, ShopperId, Showtime};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;

/// Result of a select call.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "action", rename_all = "camelCase")]
pub enum SelectOutcome {
    /// Seat is now held by the shopper.
    #[serde(rename_all = "camelCase")]
    Selected {
        /// When the shopper's selection lapses
        expires_at: DateTime<Utc>,
    },
    /// Seat was already held by the shopper and has been released.
    Deselected,
}

/// A shopper's current seats for one showtime.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Selection {
    /// Shopper
    pub holder: ShopperId,
    /// Showtime
    pub showtime: Showtime,
    /// Held and reserved seats, by seat number
    pub seats: Vec<Seat>,
    /// Shared expiry, `None` for an empty selection
    pub expires_at: Option<DateTime<Utc>>,
    /// When the oldest seat in the selection was picked
    pub created_at: Option<DateTime<Utc>>,
}

impl Selection {
    /// The selection as a [`Hold`], if it holds anything.
    #[must_use]
    pub fn hold(&self) -> Option<Hold> {
        Some(Hold {
            holder: self.holder.clone(),
            seats: self.seats.iter().map(|seat| seat.key.clone()).collect(),
            expires_at: self.expires_at?,
        })
    }
}

/// Reservation manager.
#[derive(Clone)]
pub struct ReservationManager {
    env: Arc<TicketingEnvironment>,
    config: ReservationConfig,
}

impl ReservationManager {
    /// Creates a new `ReservationManager`
    #[must_use]
    pub const fn new(env: Arc<TicketingEnvironment>, config: ReservationConfig) -> Self {
        Self { env, config }
    }

    /// Maximum seats per shopper and showtime.
    #[must_use]
    pub const fn max_selection(&self) -> usize {
        self.config.max_selection
    }

    /// Toggle a seat in the shopper's selection.
    ///
    /// Selecting a seat the shopper already holds releases it, so a
    /// double-click never leaves a stray hold.
    ///
    /// # Errors
    ///
    /// - `SeatUnavailable`: Seat is not available
    /// - `SelectionLimitExceeded`: Shopper already holds the maximum
    /// - `SeatNotFound`, `StoreUnavailable`
    pub async fn select_seat(&self, shopper: &ShopperId, key: &SeatKey) -> TicketingResult<SelectOutcome> {
        let now = self.env.clock.now();
        let mut seat = self.env.inventory.get_seat(key).await?;
        if seat.hold_expired(now) {
            self.env.inventory.expire_holds(now, Some(&key.showtime())).await?;
            seat = self.env.inventory.get_seat(key).await?;
        }

        if seat.status == SeatStatus::Held && seat.is_held_by(shopper) {
            self.deselect_seat(shopper, key).await?;
            return Ok(SelectOutcome::Deselected);
        }
        if seat.status != SeatStatus::Available {
            return Err(TicketingError::SeatUnavailable {
                seat: key.clone(),
                status: seat.status.public(),
            });
        }

        let showtime = key.showtime();
        let current = self.active_holds(shopper, &showtime, now).await?;
        if current.len() >= self.config.max_selection {
            return Err(TicketingError::SelectionLimitExceeded {
                limit: self.config.max_selection,
            });
        }
        let expires_at = current
            .iter()
            .filter_map(|held| held.hold_expires_at)
            .min()
            .unwrap_or(now + self.config.hold_ttl());

        let claim = SeatTransition::new(key.clone(), SeatStatus::Available, SeatStatus::Held)
            .claim(shopper.clone(), expires_at);
        match self.env.inventory.transition(claim, now).await {
            Ok(_) => {}
            Err(StoreError::Conflict { actual, .. }) => {
                return Err(TicketingError::SeatUnavailable {
                    seat: key.clone(),
                    status: actual.public(),
                });
            }
            Err(other) => return Err(other.into()),
        }

        // Two concurrent selects by the same shopper can both pass the limit
        // check; whichever lands over the limit gives its seat back.
        let after = self.active_holds(shopper, &showtime, now).await?;
        if after.len() > self.config.max_selection {
            self.release(shopper, key).await?;
            return Err(TicketingError::SelectionLimitExceeded {
                limit: self.config.max_selection,
            });
        }

        tracing::info!(
            shopper = %shopper,
            seat = %key,
            expires_at = %expires_at,
            "Seat held"
        );
        metrics::record_hold_created();
        Ok(SelectOutcome::Selected { expires_at })
    }

    /// Release a seat the shopper holds.
    ///
    /// # Errors
    ///
    /// - `NotHolder`: Seat is not held by the shopper
    /// - `SeatNotFound`, `StoreUnavailable`
    pub async fn deselect_seat(&self, shopper: &ShopperId, key: &SeatKey) -> TicketingResult<()> {
        self.release(shopper, key).await?;
        tracing::info!(shopper = %shopper, seat = %key, "Seat released");
        metrics::record_hold_released();
        Ok(())
    }

    /// The shopper's held and reserved seats with their shared expiry.
    ///
    /// # Errors
    ///
    /// `StoreUnavailable`.
    pub async fn selection(&self, shopper: &ShopperId, showtime: &Showtime) -> TicketingResult<Selection> {
        let now = self.env.clock.now();
        let mut seats = self.active_holds(shopper, showtime, now).await?;
        seats.sort_by_key(|seat| seat.key.seat_no);

        let expires_at = seats.iter().filter_map(|seat| seat.hold_expires_at).min();
        let mut created_at: Option<DateTime<Utc>> = None;
        for seat in &seats {
            let picked = self
                .env
                .inventory
                .audit_trail(&seat.key)
                .await?
                .into_iter()
                .rev()
                .find(|record| record.to == SeatStatus::Held && record.holder.as_ref() == Some(shopper))
                .map(|record| record.at);
            created_at = match (created_at, picked) {
                (Some(a), Some(b)) => Some(a.min(b)),
                (a, b) => a.or(b),
            };
        }

        Ok(Selection {
            holder: shopper.clone(),
            showtime: showtime.clone(),
            seats,
            expires_at,
            created_at,
        })
    }

    /// Release every lapsed hold, across all showtimes.
    ///
    /// # Errors
    ///
    /// `StoreUnavailable`.
    pub async fn expire_holds(&self) -> TicketingResult<Vec<SeatKey>> {
        let released = self.env.inventory.expire_holds(self.env.clock.now(), None).await?;
        if !released.is_empty() {
            tracing::info!(count = released.len(), "Expired holds released");
            metrics::record_holds_expired(released.len());
        }
        Ok(released)
    }

    async fn active_holds(
        &self,
        shopper: &ShopperId,
        showtime: &Showtime,
        now: DateTime<Utc>,
    ) -> TicketingResult<Vec<Seat>> {
        Ok(self
            .env
            .inventory
            .holds_for(shopper, showtime)
            .await?
            .into_iter()
            .filter(|seat| !seat.hold_expired(now))
            .collect())
    }

    async fn release(&self, shopper: &ShopperId, key: &SeatKey) -> TicketingResult<()> {
        let release = SeatTransition::new(key.clone(), SeatStatus::Held, SeatStatus::Available)
            .guarded_by(shopper.clone())
            .release();
        match self.env.inventory.transition(release, self.env.clock.now()).await {
            Ok(_) => Ok(()),
            Err(StoreError::Conflict { .. }) => Err(TicketingError::NotHolder { seat: key.clone() }),
            Err(other) => Err(other.into()),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use boxoffice_core::environment::Clock;
    use boxoffice_core::store::InventoryStore;
    use boxoffice_core::types::{Money, SeatCategory, SeatNo};
    use boxoffice_testing::fixtures::{SeatMapBuilder, shopper, test_showtime};
    use boxoffice_testing::{InMemoryStore, ManualClock, MockPaymentProvider};
    use chrono::Duration;

    async fn manager() -> (ReservationManager, InMemoryStore, ManualClock) {
        let store = InMemoryStore::new();
        store
            .seed_seats(
                SeatMapBuilder::new(test_showtime())
                    .category(SeatCategory::A, 1..=10, Money::from_cents(5000))
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

    fn seat(no: u32) -> SeatKey {
        test_showtime().seat(SeatNo(no))
    }

    #[tokio::test]
    async fn test_select_holds_seat_for_ttl() {
        let (manager, store, clock) = manager().await;
        let outcome = manager.select_seat(&shopper("x"), &seat(1)).await.unwrap();

        assert_eq!(
            outcome,
            SelectOutcome::Selected {
                expires_at: clock.now() + Duration::minutes(10)
            }
        );
        let held = store.seat(&seat(1)).unwrap();
        assert_eq!(held.status, SeatStatus::Held);
        assert_eq!(held.holder, Some(shopper("x")));
    }

    #[tokio::test]
    async fn test_second_select_toggles_off() {
        let (manager, store, _) = manager().await;
        manager.select_seat(&shopper("x"), &seat(1)).await.unwrap();
        let outcome = manager.select_seat(&shopper("x"), &seat(1)).await.unwrap();

        assert_eq!(outcome, SelectOutcome::Deselected);
        assert_eq!(store.seat(&seat(1)).unwrap().status, SeatStatus::Available);
    }

    #[tokio::test]
    async fn test_later_seats_share_first_expiry() {
        let (manager, _, clock) = manager().await;
        let first = manager.select_seat(&shopper("x"), &seat(1)).await.unwrap();
        clock.advance(Duration::minutes(4));
        let second = manager.select_seat(&shopper("x"), &seat(2)).await.unwrap();

        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_other_shopper_cannot_take_held_seat() {
        let (manager, _, _) = manager().await;
        manager.select_seat(&shopper("x"), &seat(1)).await.unwrap();
        let err = manager.select_seat(&shopper("y"), &seat(1)).await.unwrap_err();

        assert!(matches!(err, TicketingError::SeatUnavailable { status: SeatStatus::Held, .. }));
    }

    #[tokio::test]
    async fn test_expired_hold_can_be_taken() {
        let (manager, store, clock) = manager().await;
        manager.select_seat(&shopper("x"), &seat(1)).await.unwrap();
        clock.advance(Duration::minutes(11));

        manager.select_seat(&shopper("y"), &seat(1)).await.unwrap();
        assert_eq!(store.seat(&seat(1)).unwrap().holder, Some(shopper("y")));
    }

    #[tokio::test]
    async fn test_sixth_seat_rejected() {
        let (manager, _, _) = manager().await;
        for no in 1..=5 {
            manager.select_seat(&shopper("x"), &seat(no)).await.unwrap();
        }
        let err = manager.select_seat(&shopper("x"), &seat(6)).await.unwrap_err();

        assert_eq!(err, TicketingError::SelectionLimitExceeded { limit: 5 });
        let selection = manager.selection(&shopper("x"), &test_showtime()).await.unwrap();
        assert_eq!(selection.seats.len(), 5);
    }

    #[tokio::test]
    async fn test_deselect_requires_holder() {
        let (manager, _, _) = manager().await;
        manager.select_seat(&shopper("x"), &seat(1)).await.unwrap();

        let err = manager.deselect_seat(&shopper("y"), &seat(1)).await.unwrap_err();
        assert!(matches!(err, TicketingError::NotHolder { .. }));
        let err = manager.deselect_seat(&shopper("y"), &seat(2)).await.unwrap_err();
        assert!(matches!(err, TicketingError::NotHolder { .. }));
    }

    #[tokio::test]
    async fn test_selection_reports_shared_expiry_and_start() {
        let (manager, _, clock) = manager().await;
        let started = clock.now();
        manager.select_seat(&shopper("x"), &seat(3)).await.unwrap();
        clock.advance(Duration::minutes(1));
        manager.select_seat(&shopper("x"), &seat(1)).await.unwrap();

        let selection = manager.selection(&shopper("x"), &test_showtime()).await.unwrap();
        assert_eq!(
            selection.seats.iter().map(|s| s.key.seat_no).collect::<Vec<_>>(),
            vec![SeatNo(1), SeatNo(3)]
        );
        assert_eq!(selection.created_at, Some(started));
        assert_eq!(selection.expires_at, Some(started + Duration::minutes(10)));
        assert_eq!(selection.hold().unwrap().seats.len(), 2);
    }

    #[tokio::test]
    async fn test_sweep_releases_lapsed_holds() {
        let (manager, store, clock) = manager().await;
        manager.select_seat(&shopper("x"), &seat(1)).await.unwrap();
        manager.select_seat(&shopper("x"), &seat(2)).await.unwrap();
        clock.advance(Duration::minutes(10));

        let released = manager.expire_holds().await.unwrap();
        assert_eq!(released.len(), 2);
        assert_eq!(store.count_status(&test_showtime(), SeatStatus::Held), 0);
        assert!(manager.selection(&shopper("x"), &test_showtime()).await.unwrap().hold().is_none());
    }
}
