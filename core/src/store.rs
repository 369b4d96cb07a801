//! Store traits for seat inventory, tickets and checkout sessions.
//!
//! All seat state lives behind these traits. Seats only ever change through
//! [`InventoryStore::transition`], an atomic compare-and-swap on the seat status
//! (optionally also on the holder). Two shoppers racing for one seat both issue
//! `available → held`; exactly one sees `Ok`, the other gets
//! [`StoreError::Conflict`].
//!
//! # Implementations
//!
//! - `PostgresStore` (in `boxoffice-postgres`): production implementation
//! - `InMemoryStore` (in `boxoffice-testing`): fast, deterministic tests
//!
//! # Dyn Compatibility
//!
//! The traits return [`BoxFuture`] instead of using `async fn` so they can be
//! shared as `Arc<dyn InventoryStore>` between request handlers.

use crate::BoxFuture;
use crate::types::{
    CheckoutSession, Money, PaymentId, ResaleListing, Seat, SeatKey, SeatStatus,
    SeatTransitionRecord, SessionId, ShopperId, Showtime, Ticket, TicketId, TicketStatus,
};
use chrono::{DateTime, Utc};
use thiserror::Error;

/// Errors that can occur during store operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// Seat compare-and-swap failed: the seat is no longer in the expected state.
    #[error("Seat {seat} conflict: expected {expected}, found {actual}")]
    Conflict {
        /// Seat the transition targeted
        seat: SeatKey,
        /// Status the caller expected
        expected: SeatStatus,
        /// Status the seat actually has
        actual: SeatStatus,
    },

    /// Ticket compare-and-swap failed.
    #[error("Ticket {ticket_id} conflict: expected {expected}, found {actual}")]
    TicketConflict {
        /// Ticket the transition targeted
        ticket_id: TicketId,
        /// Status the caller expected
        expected: TicketStatus,
        /// Status the ticket actually has
        actual: TicketStatus,
    },

    /// Seat does not exist.
    #[error("Seat not found: {0}")]
    SeatNotFound(SeatKey),

    /// Ticket does not exist.
    #[error("Ticket not found: {0}")]
    TicketNotFound(TicketId),

    /// Checkout session does not exist.
    #[error("Checkout session not found: {0}")]
    SessionNotFound(SessionId),

    /// A record with the same key already exists.
    #[error("Duplicate record: {0}")]
    Duplicate(String),

    /// Seats that already carry a ticket issued by another session.
    #[error("{} seat(s) already ticketed by another checkout", .seats.len())]
    AlreadyTicketed {
        /// Seats whose ticket exists
        seats: Vec<SeatKey>,
    },

    /// Database connection or query error.
    #[error("Database error: {0}")]
    DatabaseError(String),

    /// Stored data could not be decoded.
    #[error("Serialization error: {0}")]
    SerializationError(String),
}

/// Change to the seat holder applied together with a transition.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum HolderChange {
    /// Leave holder and hold expiry untouched
    Keep,
    /// Remove holder and hold expiry
    Clear,
    /// Set a new holder; `expires_at` is `None` for ownership (sold seats)
    Set {
        /// New holder
        holder: ShopperId,
        /// Hold expiry
        expires_at: Option<DateTime<Utc>>,
    },
}

/// Change to the resale listing applied together with a transition.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ListingChange {
    /// Leave the listing untouched
    Keep,
    /// Remove the listing
    Clear,
    /// Attach a listing
    Set(ResaleListing),
}

/// A compare-and-swap request for one seat.
///
/// The transition applies only if the seat is currently in `from` and, when
/// `expected_holder` is set, held by that shopper.
///
/// # Example
///
/// ```
/// use boxoffice_core::store::SeatTransition;
/// use boxoffice_core::types::{EventId, SeatKey, SeatNo, SeatStatus, ShopperId};
/// use chrono::{Duration, Utc};
///
/// let seat = SeatKey::new(EventId::new("evt-1"), Utc::now(), SeatNo(12));
/// let shopper = ShopperId::new("user-7");
/// let hold = SeatTransition::new(seat, SeatStatus::Available, SeatStatus::Held)
///     .claim(shopper, Utc::now() + Duration::minutes(10));
/// assert_eq!(hold.to, SeatStatus::Held);
/// ```
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SeatTransition {
    /// Target seat
    pub seat: SeatKey,
    /// Required current status
    pub from: SeatStatus,
    /// New status
    pub to: SeatStatus,
    /// Required current holder, if any
    pub expected_holder: Option<ShopperId>,
    /// Holder change applied on success
    pub holder: HolderChange,
    /// Listing change applied on success
    pub listing: ListingChange,
}

impl SeatTransition {
    /// Creates a transition that only changes the status.
    #[must_use]
    pub const fn new(seat: SeatKey, from: SeatStatus, to: SeatStatus) -> Self {
        Self {
            seat,
            from,
            to,
            expected_holder: None,
            holder: HolderChange::Keep,
            listing: ListingChange::Keep,
        }
    }

    /// Only apply if the seat is currently held by `holder`.
    #[must_use]
    pub fn guarded_by(mut self, holder: ShopperId) -> Self {
        self.expected_holder = Some(holder);
        self
    }

    /// Give the seat to `holder` until `expires_at`.
    #[must_use]
    pub fn claim(mut self, holder: ShopperId, expires_at: DateTime<Utc>) -> Self {
        self.holder = HolderChange::Set {
            holder,
            expires_at: Some(expires_at),
        };
        self
    }

    /// Give the seat to `owner` without expiry.
    #[must_use]
    pub fn own(mut self, owner: ShopperId) -> Self {
        self.holder = HolderChange::Set {
            holder: owner,
            expires_at: None,
        };
        self
    }

    /// Drop the holder and hold expiry.
    #[must_use]
    pub fn release(mut self) -> Self {
        self.holder = HolderChange::Clear;
        self
    }

    /// Attach a resale listing.
    #[must_use]
    pub fn list(mut self, listing: ResaleListing) -> Self {
        self.listing = ListingChange::Set(listing);
        self
    }

    /// Remove the resale listing.
    #[must_use]
    pub fn delist(mut self) -> Self {
        self.listing = ListingChange::Clear;
        self
    }

    /// Applies the transition to an in-memory seat after the guard has been
    /// checked. Stores use this so every implementation mutates seats the same way.
    pub fn apply_to(&self, seat: &mut Seat) {
        seat.status = self.to;
        match &self.holder {
            HolderChange::Keep => {}
            HolderChange::Clear => {
                seat.holder = None;
                seat.hold_expires_at = None;
            }
            HolderChange::Set { holder, expires_at } => {
                seat.holder = Some(holder.clone());
                seat.hold_expires_at = *expires_at;
            }
        }
        match &self.listing {
            ListingChange::Keep => {}
            ListingChange::Clear => seat.listing = None,
            ListingChange::Set(listing) => seat.listing = Some(listing.clone()),
        }
    }

    /// Whether `seat` satisfies the guard.
    #[must_use]
    pub fn matches(&self, seat: &Seat) -> bool {
        seat.status == self.from
            && self
                .expected_holder
                .as_ref()
                .is_none_or(|expected| seat.holder.as_ref() == Some(expected))
    }
}

/// Durable seat inventory with atomic per-seat compare-and-swap.
pub trait InventoryStore: Send + Sync {
    /// Insert a seat map. Existing seats are left untouched.
    ///
    /// # Errors
    ///
    /// - `DatabaseError`: Database connection or query failed
    fn seed_seats(&self, seats: Vec<Seat>) -> BoxFuture<'_, Result<(), StoreError>>;

    /// All seats of a showtime, ordered by seat number.
    ///
    /// Returns an empty vector for an unknown showtime.
    ///
    /// # Errors
    ///
    /// - `DatabaseError`: Database connection or query failed
    fn list_seats<'a>(&'a self, showtime: &'a Showtime) -> BoxFuture<'a, Result<Vec<Seat>, StoreError>>;

    /// A single seat.
    ///
    /// # Errors
    ///
    /// - `SeatNotFound`: No such seat
    /// - `DatabaseError`: Database connection or query failed
    fn get_seat<'a>(&'a self, seat: &'a SeatKey) -> BoxFuture<'a, Result<Seat, StoreError>>;

    /// Seats of a showtime currently held or reserved by `holder`.
    ///
    /// # Errors
    ///
    /// - `DatabaseError`: Database connection or query failed
    fn holds_for<'a>(
        &'a self,
        holder: &'a ShopperId,
        showtime: &'a Showtime,
    ) -> BoxFuture<'a, Result<Vec<Seat>, StoreError>>;

    /// Atomically apply `transition` and append an audit record stamped `at`.
    ///
    /// # Errors
    ///
    /// - `Conflict`: The seat is not in `transition.from` (or not held by the expected holder)
    /// - `SeatNotFound`: No such seat
    /// - `DatabaseError`: Database connection or query failed
    fn transition(
        &self,
        transition: SeatTransition,
        at: DateTime<Utc>,
    ) -> BoxFuture<'_, Result<Seat, StoreError>>;

    /// Revert every hold that expired at or before `now`.
    ///
    /// `held`/`reserved` seats go back to `available`; `reserved_for_resale`
    /// seats go back to `resale_listed` with the seller as holder. `scope`
    /// limits the sweep to one showtime. Each reverted seat gets an audit record.
    ///
    /// Returns the keys of the seats that were released.
    ///
    /// # Errors
    ///
    /// - `DatabaseError`: Database connection or query failed
    fn expire_holds<'a>(
        &'a self,
        now: DateTime<Utc>,
        scope: Option<&'a Showtime>,
    ) -> BoxFuture<'a, Result<Vec<SeatKey>, StoreError>>;

    /// Audit records for a seat, oldest first.
    ///
    /// # Errors
    ///
    /// - `DatabaseError`: Database connection or query failed
    fn audit_trail<'a>(
        &'a self,
        seat: &'a SeatKey,
    ) -> BoxFuture<'a, Result<Vec<SeatTransitionRecord>, StoreError>>;

    /// Cheap connectivity probe used by readiness checks.
    ///
    /// # Errors
    ///
    /// - `DatabaseError`: The store is unreachable
    fn ping(&self) -> BoxFuture<'_, Result<(), StoreError>>;
}

/// Durable ticket records.
pub trait TicketStore: Send + Sync {
    /// A single ticket.
    ///
    /// # Errors
    ///
    /// - `TicketNotFound`: No such ticket
    /// - `DatabaseError`: Database connection or query failed
    fn get_ticket(&self, ticket_id: TicketId) -> BoxFuture<'_, Result<Ticket, StoreError>>;

    /// Tickets currently owned by `owner`, ordered by showtime then seat.
    ///
    /// # Errors
    ///
    /// - `DatabaseError`: Database connection or query failed
    fn tickets_for_owner<'a>(
        &'a self,
        owner: &'a ShopperId,
    ) -> BoxFuture<'a, Result<Vec<Ticket>, StoreError>>;

    /// Compare-and-swap on ticket status.
    ///
    /// Moving to `resale_listed` stores `resale_price`; moving back to
    /// `confirmed` clears it; moving to `checked_in` sets `is_checked_in`.
    ///
    /// # Errors
    ///
    /// - `TicketConflict`: Ticket is not in `from`
    /// - `TicketNotFound`: No such ticket
    /// - `DatabaseError`: Database connection or query failed
    fn transition_ticket(
        &self,
        ticket_id: TicketId,
        from: TicketStatus,
        to: TicketStatus,
        resale_price: Option<Money>,
    ) -> BoxFuture<'_, Result<Ticket, StoreError>>;
}

/// Durable checkout sessions and the reconciliation commit points.
///
/// `record_purchase` and `record_resale` are the idempotency guards: each
/// flips the session from `pending` to `verified` exactly once, atomically
/// with the ticket writes. A second caller gets the stored result back.
pub trait CheckoutStore: Send + Sync {
    /// Persist a new pending session.
    ///
    /// # Errors
    ///
    /// - `Duplicate`: A session with this id exists
    /// - `DatabaseError`: Database connection or query failed
    fn create_session(&self, session: CheckoutSession) -> BoxFuture<'_, Result<(), StoreError>>;

    /// A session by provider id.
    ///
    /// # Errors
    ///
    /// - `SessionNotFound`: No such session
    /// - `DatabaseError`: Database connection or query failed
    fn get_session<'a>(
        &'a self,
        session_id: &'a SessionId,
    ) -> BoxFuture<'a, Result<CheckoutSession, StoreError>>;

    /// Tickets issued (or transferred) by a verified session, as linked at
    /// the time it was verified. A ticket later resold still belongs to the
    /// session that first issued it.
    ///
    /// # Errors
    ///
    /// - `DatabaseError`: Database connection or query failed
    fn tickets_for_session<'a>(
        &'a self,
        session_id: &'a SessionId,
    ) -> BoxFuture<'a, Result<Vec<Ticket>, StoreError>>;

    /// Insert `tickets` and mark the session verified with `payment_id`.
    ///
    /// If the session is already verified nothing is written and the stored
    /// tickets are returned instead.
    ///
    /// # Errors
    ///
    /// - `AlreadyTicketed`: Another session already issued a ticket for one of
    ///   the seats; nothing is written and the session stays pending
    /// - `SessionNotFound`: No such session
    /// - `DatabaseError`: Database connection or query failed
    fn record_purchase<'a>(
        &'a self,
        session_id: &'a SessionId,
        payment_id: PaymentId,
        tickets: Vec<Ticket>,
    ) -> BoxFuture<'a, Result<Vec<Ticket>, StoreError>>;

    /// Transfer `ticket_id` to `buyer`, set it back to `confirmed` with the new
    /// payment, and mark the session verified.
    ///
    /// If the session is already verified the current ticket is returned.
    ///
    /// # Errors
    ///
    /// - `TicketConflict`: The ticket is no longer listed for resale (another
    ///   session already transferred it); nothing is written
    /// - `SessionNotFound`: No such session
    /// - `TicketNotFound`: No such ticket
    /// - `DatabaseError`: Database connection or query failed
    fn record_resale<'a>(
        &'a self,
        session_id: &'a SessionId,
        payment_id: PaymentId,
        ticket_id: TicketId,
        buyer: ShopperId,
    ) -> BoxFuture<'a, Result<Ticket, StoreError>>;

    /// Mark a pending session failed. No-op for non-pending sessions.
    ///
    /// # Errors
    ///
    /// - `SessionNotFound`: No such session
    /// - `DatabaseError`: Database connection or query failed
    fn mark_failed<'a>(
        &'a self,
        session_id: &'a SessionId,
        payment_id: Option<PaymentId>,
    ) -> BoxFuture<'a, Result<(), StoreError>>;
}
