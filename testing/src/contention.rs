//! Inventory wrapper that loses a seat to another shopper mid-operation.
//!
//! Multi-seat operations read every seat first and then apply one CAS per
//! seat. [`ContendedInventory`] lets a test make a later CAS fail after the
//! earlier ones succeeded, which is otherwise only reachable under a real race.

#![allow(clippy::unwrap_used)] // Test infrastructure uses unwrap for simplicity
#![allow(clippy::missing_panics_doc)] // Panics only on a poisoned lock

use crate::InMemoryStore;
use boxoffice_core::BoxFuture;
use boxoffice_core::store::{InventoryStore, SeatTransition, StoreError};
use boxoffice_core::types::{Seat, SeatKey, SeatStatus, SeatTransitionRecord, ShopperId, Showtime};
use chrono::{DateTime, Utc};
use std::sync::{Arc, Mutex};

#[derive(Debug, Clone)]
struct Steal {
    seat: SeatKey,
    from: SeatStatus,
    to: SeatStatus,
    thief: ShopperId,
}

/// [`InventoryStore`] over an [`InMemoryStore`] that hands one seat to another
/// shopper just before a chosen transition runs.
///
/// The steal fires once. Every other call goes straight to the inner store.
#[derive(Clone, Debug)]
pub struct ContendedInventory {
    inner: InMemoryStore,
    steal: Arc<Mutex<Option<Steal>>>,
}

impl ContendedInventory {
    /// Wrap `inner` with no steal armed.
    #[must_use]
    pub fn new(inner: InMemoryStore) -> Self {
        Self {
            inner,
            steal: Arc::new(Mutex::new(None)),
        }
    }

    /// The next `from → to` transition on `seat` finds it held by `thief`.
    pub fn steal_on(&self, seat: SeatKey, from: SeatStatus, to: SeatStatus, thief: ShopperId) {
        *self.steal.lock().unwrap() = Some(Steal { seat, from, to, thief });
    }

    /// Whether the armed steal has fired.
    #[must_use]
    pub fn fired(&self) -> bool {
        self.steal.lock().unwrap().is_none()
    }

    fn interfere(&self, transition: &SeatTransition) {
        let mut armed = self.steal.lock().unwrap();
        let hit = armed.as_ref().is_some_and(|steal| {
            steal.seat == transition.seat && steal.from == transition.from && steal.to == transition.to
        });
        if !hit {
            return;
        }
        if let (Some(steal), Some(mut seat)) = (armed.take(), self.inner.seat(&transition.seat)) {
            seat.status = SeatStatus::Held;
            seat.holder = Some(steal.thief);
            self.inner.put_seat(seat);
        }
    }
}

impl InventoryStore for ContendedInventory {
    fn seed_seats(&self, seats: Vec<Seat>) -> BoxFuture<'_, Result<(), StoreError>> {
        self.inner.seed_seats(seats)
    }

    fn list_seats<'a>(&'a self, showtime: &'a Showtime) -> BoxFuture<'a, Result<Vec<Seat>, StoreError>> {
        self.inner.list_seats(showtime)
    }

    fn get_seat<'a>(&'a self, seat: &'a SeatKey) -> BoxFuture<'a, Result<Seat, StoreError>> {
        self.inner.get_seat(seat)
    }

    fn holds_for<'a>(
        &'a self,
        holder: &'a ShopperId,
        showtime: &'a Showtime,
    ) -> BoxFuture<'a, Result<Vec<Seat>, StoreError>> {
        self.inner.holds_for(holder, showtime)
    }

    fn transition(
        &self,
        transition: SeatTransition,
        at: DateTime<Utc>,
    ) -> BoxFuture<'_, Result<Seat, StoreError>> {
        self.interfere(&transition);
        self.inner.transition(transition, at)
    }

    fn expire_holds<'a>(
        &'a self,
        now: DateTime<Utc>,
        scope: Option<&'a Showtime>,
    ) -> BoxFuture<'a, Result<Vec<SeatKey>, StoreError>> {
        self.inner.expire_holds(now, scope)
    }

    fn audit_trail<'a>(
        &'a self,
        seat: &'a SeatKey,
    ) -> BoxFuture<'a, Result<Vec<SeatTransitionRecord>, StoreError>> {
        self.inner.audit_trail(seat)
    }

    fn ping(&self) -> BoxFuture<'_, Result<(), StoreError>> {
        self.inner.ping()
    }
}
