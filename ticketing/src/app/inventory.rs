//! Seat map reads with lazy hold expiry.

use super::TicketingEnvironment;
use crate::error::TicketingResult;
use crate::metrics;
use boxoffice_core::types::{Seat, SeatKey, SeatTransitionRecord, Showtime};
use std::sync::Arc;

/// Read side of the seat inventory.
#[derive(Clone)]
pub struct InventoryService {
    env: Arc<TicketingEnvironment>,
}

impl InventoryService {
    /// Creates a new `InventoryService`
    #[must_use]
    pub const fn new(env: Arc<TicketingEnvironment>) -> Self {
        Self { env }
    }

    /// Seats of a showtime, ordered by seat number.
    ///
    /// Lapsed holds of the showtime are released first, so an expired hold
    /// never shows as taken.
    ///
    /// # Errors
    ///
    /// [`StoreUnavailable`](crate::TicketingError::StoreUnavailable) when the
    /// store cannot be read; no partial map is returned.
    pub async fn list_seats(&self, showtime: &Showtime) -> TicketingResult<Vec<Seat>> {
        self.release_lapsed(showtime).await?;
        Ok(self.env.inventory.list_seats(showtime).await?)
    }

    /// A single seat, after lazy expiry of its showtime.
    ///
    /// # Errors
    ///
    /// `SeatNotFound` or `StoreUnavailable`.
    pub async fn seat(&self, key: &SeatKey) -> TicketingResult<Seat> {
        let seat = self.env.inventory.get_seat(key).await?;
        if !seat.hold_expired(self.env.clock.now()) {
            return Ok(seat);
        }
        self.release_lapsed(&key.showtime()).await?;
        Ok(self.env.inventory.get_seat(key).await?)
    }

    /// Transition history of a seat, oldest first.
    ///
    /// # Errors
    ///
    /// `StoreUnavailable`.
    pub async fn audit_trail(&self, key: &SeatKey) -> TicketingResult<Vec<SeatTransitionRecord>> {
        Ok(self.env.inventory.audit_trail(key).await?)
    }

    /// Insert a seat map; seats that already exist are left as they are.
    ///
    /// # Errors
    ///
    /// `StoreUnavailable`.
    pub async fn seed(&self, seats: Vec<Seat>) -> TicketingResult<()> {
        let count = seats.len();
        self.env.inventory.seed_seats(seats).await?;
        tracing::info!(count, "Seat map seeded");
        Ok(())
    }

    pub(crate) async fn release_lapsed(&self, showtime: &Showtime) -> TicketingResult<Vec<SeatKey>> {
        let released = self
            .env
            .inventory
            .expire_holds(self.env.clock.now(), Some(showtime))
            .await?;
        if !released.is_empty() {
            tracing::info!(showtime = %showtime, count = released.len(), "Released lapsed holds");
            metrics::record_holds_expired(released.len());
        }
        Ok(released)
    }
}
