//! In-memory store for fast, deterministic tests.
//!
//! [`InMemoryStore`] implements all three store traits over a single lock, so
//! every compare-and-swap is trivially atomic. It mirrors the semantics of the
//! Postgres store and adds a few knobs tests need: forcing a seat into a state,
//! and simulating an outage.

#![allow(clippy::unwrap_used)] // Test infrastructure uses unwrap for simplicity
#![allow(clippy::missing_panics_doc)] // Panics only on a poisoned lock

use boxoffice_core::BoxFuture;
use boxoffice_core::store::{CheckoutStore, InventoryStore, SeatTransition, StoreError, TicketStore};
use boxoffice_core::types::{
    CheckoutSession, CheckoutStatus, Money, PaymentId, Seat, SeatKey, SeatStatus,
    SeatTransitionRecord, SessionId, ShopperId, Showtime, Ticket, TicketId, TicketStatus,
};
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};

#[derive(Debug, Default)]
struct Tables {
    seats: BTreeMap<SeatKey, Seat>,
    transitions: Vec<SeatTransitionRecord>,
    tickets: HashMap<TicketId, Ticket>,
    sessions: HashMap<SessionId, CheckoutSession>,
    session_tickets: HashMap<SessionId, Vec<TicketId>>,
}

/// In-memory implementation of every store trait.
///
/// Cloning shares the underlying tables.
///
/// # Example
///
/// ```
/// use boxoffice_testing::InMemoryStore;
/// use boxoffice_core::store::InventoryStore;
/// use boxoffice_core::types::{EventId, Showtime};
/// use chrono::Utc;
///
/// # tokio_test::block_on(async {
/// let store = InMemoryStore::new();
/// let seats = store.list_seats(&Showtime::new(EventId::new("evt"), Utc::now())).await.unwrap();
/// assert!(seats.is_empty());
/// # });
/// ```
#[derive(Clone, Debug, Default)]
pub struct InMemoryStore {
    tables: Arc<RwLock<Tables>>,
    unavailable: Arc<AtomicBool>,
}

impl InMemoryStore {
    /// Create an empty store
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Overwrite a seat regardless of its current state.
    ///
    /// Lets tests stage states that would otherwise need a full flow, or
    /// simulate another process changing a seat behind a manager's back.
    pub fn put_seat(&self, seat: Seat) {
        self.tables.write().unwrap().seats.insert(seat.key.clone(), seat);
    }

    /// Insert a ticket directly.
    pub fn put_ticket(&self, ticket: Ticket) {
        self.tables.write().unwrap().tickets.insert(ticket.ticket_id, ticket);
    }

    /// Snapshot of a seat, if present.
    #[must_use]
    pub fn seat(&self, key: &SeatKey) -> Option<Seat> {
        self.tables.read().unwrap().seats.get(key).cloned()
    }

    /// Number of seats of a showtime in `status`.
    #[must_use]
    pub fn count_status(&self, showtime: &Showtime, status: SeatStatus) -> usize {
        self.tables
            .read()
            .unwrap()
            .seats
            .values()
            .filter(|seat| seat.key.showtime() == *showtime && seat.status == status)
            .count()
    }

    /// Every ticket in the store.
    #[must_use]
    pub fn all_tickets(&self) -> Vec<Ticket> {
        self.tables.read().unwrap().tickets.values().cloned().collect()
    }

    /// Make every subsequent call fail with `DatabaseError` until reset.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    fn check_available(&self) -> Result<(), StoreError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(StoreError::DatabaseError("store unavailable".to_string()));
        }
        Ok(())
    }

    fn apply(&self, transition: &SeatTransition, at: DateTime<Utc>) -> Result<Seat, StoreError> {
        self.check_available()?;
        let mut tables = self.tables.write().unwrap();
        let seat = tables
            .seats
            .get_mut(&transition.seat)
            .ok_or_else(|| StoreError::SeatNotFound(transition.seat.clone()))?;

        if !transition.matches(seat) {
            return Err(StoreError::Conflict {
                seat: transition.seat.clone(),
                expected: transition.from,
                actual: seat.status,
            });
        }

        transition.apply_to(seat);
        let updated = seat.clone();
        tables.transitions.push(SeatTransitionRecord {
            seat: updated.key.clone(),
            from: transition.from,
            to: transition.to,
            holder: updated.holder.clone(),
            at,
        });
        Ok(updated)
    }

    fn sweep(&self, now: DateTime<Utc>, scope: Option<&Showtime>) -> Result<Vec<SeatKey>, StoreError> {
        self.check_available()?;
        let mut tables = self.tables.write().unwrap();
        let mut released = Vec::new();
        let mut records = Vec::new();

        for seat in tables.seats.values_mut() {
            if scope.is_some_and(|showtime| seat.key.showtime() != *showtime) {
                continue;
            }
            if !seat.hold_expired(now) {
                continue;
            }
            let Some(to) = seat.status.on_expiry() else {
                continue;
            };
            let from = seat.status;
            seat.status = to;
            seat.hold_expires_at = None;
            seat.holder = match to {
                SeatStatus::ResaleListed => seat.listing.as_ref().map(|listing| listing.seller.clone()),
                _ => None,
            };
            records.push(SeatTransitionRecord {
                seat: seat.key.clone(),
                from,
                to,
                holder: seat.holder.clone(),
                at: now,
            });
            released.push(seat.key.clone());
        }

        tables.transitions.extend(records);
        Ok(released)
    }

    fn move_ticket(
        &self,
        ticket_id: TicketId,
        from: TicketStatus,
        to: TicketStatus,
        resale_price: Option<Money>,
    ) -> Result<Ticket, StoreError> {
        self.check_available()?;
        let mut tables = self.tables.write().unwrap();
        let ticket = tables
            .tickets
            .get_mut(&ticket_id)
            .ok_or(StoreError::TicketNotFound(ticket_id))?;

        if ticket.status != from {
            return Err(StoreError::TicketConflict {
                ticket_id,
                expected: from,
                actual: ticket.status,
            });
        }

        ticket.status = to;
        match to {
            TicketStatus::ResaleListed => ticket.resale_price = resale_price,
            TicketStatus::Confirmed => ticket.resale_price = None,
            TicketStatus::CheckedIn => ticket.is_checked_in = true,
        }
        Ok(ticket.clone())
    }

    fn session_tickets(tables: &Tables, session_id: &SessionId) -> Vec<Ticket> {
        let mut tickets: Vec<Ticket> = tables
            .session_tickets
            .get(session_id)
            .into_iter()
            .flatten()
            .filter_map(|ticket_id| tables.tickets.get(ticket_id))
            .cloned()
            .collect();
        tickets.sort_by_key(|ticket| ticket.seat_no);
        tickets
    }

    fn link(tables: &mut Tables, session_id: &SessionId, ticket_id: TicketId) {
        tables
            .session_tickets
            .entry(session_id.clone())
            .or_default()
            .push(ticket_id);
    }
}

impl InventoryStore for InMemoryStore {
    fn seed_seats(&self, seats: Vec<Seat>) -> BoxFuture<'_, Result<(), StoreError>> {
        Box::pin(async move {
            self.check_available()?;
            let mut tables = self.tables.write().unwrap();
            for seat in seats {
                tables.seats.entry(seat.key.clone()).or_insert(seat);
            }
            Ok(())
        })
    }

    fn list_seats<'a>(&'a self, showtime: &'a Showtime) -> BoxFuture<'a, Result<Vec<Seat>, StoreError>> {
        Box::pin(async move {
            self.check_available()?;
            // BTreeMap order is (event, datetime, seat_no), so seats come out sorted
            Ok(self
                .tables
                .read()
                .unwrap()
                .seats
                .values()
                .filter(|seat| seat.key.showtime() == *showtime)
                .cloned()
                .collect())
        })
    }

    fn get_seat<'a>(&'a self, seat: &'a SeatKey) -> BoxFuture<'a, Result<Seat, StoreError>> {
        Box::pin(async move {
            self.check_available()?;
            self.tables
                .read()
                .unwrap()
                .seats
                .get(seat)
                .cloned()
                .ok_or_else(|| StoreError::SeatNotFound(seat.clone()))
        })
    }

    fn holds_for<'a>(
        &'a self,
        holder: &'a ShopperId,
        showtime: &'a Showtime,
    ) -> BoxFuture<'a, Result<Vec<Seat>, StoreError>> {
        Box::pin(async move {
            self.check_available()?;
            Ok(self
                .tables
                .read()
                .unwrap()
                .seats
                .values()
                .filter(|seat| {
                    seat.key.showtime() == *showtime
                        && matches!(seat.status, SeatStatus::Held | SeatStatus::Reserved)
                        && seat.is_held_by(holder)
                })
                .cloned()
                .collect())
        })
    }

    fn transition(
        &self,
        transition: SeatTransition,
        at: DateTime<Utc>,
    ) -> BoxFuture<'_, Result<Seat, StoreError>> {
        Box::pin(async move { self.apply(&transition, at) })
    }

    fn expire_holds<'a>(
        &'a self,
        now: DateTime<Utc>,
        scope: Option<&'a Showtime>,
    ) -> BoxFuture<'a, Result<Vec<SeatKey>, StoreError>> {
        Box::pin(async move { self.sweep(now, scope) })
    }

    fn audit_trail<'a>(
        &'a self,
        seat: &'a SeatKey,
    ) -> BoxFuture<'a, Result<Vec<SeatTransitionRecord>, StoreError>> {
        Box::pin(async move {
            self.check_available()?;
            Ok(self
                .tables
                .read()
                .unwrap()
                .transitions
                .iter()
                .filter(|record| &record.seat == seat)
                .cloned()
                .collect())
        })
    }

    fn ping(&self) -> BoxFuture<'_, Result<(), StoreError>> {
        Box::pin(async move { self.check_available() })
    }
}

impl TicketStore for InMemoryStore {
    fn get_ticket(&self, ticket_id: TicketId) -> BoxFuture<'_, Result<Ticket, StoreError>> {
        Box::pin(async move {
            self.check_available()?;
            self.tables
                .read()
                .unwrap()
                .tickets
                .get(&ticket_id)
                .cloned()
                .ok_or(StoreError::TicketNotFound(ticket_id))
        })
    }

    fn tickets_for_owner<'a>(
        &'a self,
        owner: &'a ShopperId,
    ) -> BoxFuture<'a, Result<Vec<Ticket>, StoreError>> {
        Box::pin(async move {
            self.check_available()?;
            let mut tickets: Vec<Ticket> = self
                .tables
                .read()
                .unwrap()
                .tickets
                .values()
                .filter(|ticket| &ticket.owner_id == owner)
                .cloned()
                .collect();
            tickets.sort_by(|a, b| {
                (a.event_datetime, a.seat_no).cmp(&(b.event_datetime, b.seat_no))
            });
            Ok(tickets)
        })
    }

    fn transition_ticket(
        &self,
        ticket_id: TicketId,
        from: TicketStatus,
        to: TicketStatus,
        resale_price: Option<Money>,
    ) -> BoxFuture<'_, Result<Ticket, StoreError>> {
        Box::pin(async move { self.move_ticket(ticket_id, from, to, resale_price) })
    }
}

impl CheckoutStore for InMemoryStore {
    fn create_session(&self, session: CheckoutSession) -> BoxFuture<'_, Result<(), StoreError>> {
        Box::pin(async move {
            self.check_available()?;
            let mut tables = self.tables.write().unwrap();
            if tables.sessions.contains_key(&session.session_id) {
                return Err(StoreError::Duplicate(session.session_id.to_string()));
            }
            tables.sessions.insert(session.session_id.clone(), session);
            Ok(())
        })
    }

    fn get_session<'a>(
        &'a self,
        session_id: &'a SessionId,
    ) -> BoxFuture<'a, Result<CheckoutSession, StoreError>> {
        Box::pin(async move {
            self.check_available()?;
            self.tables
                .read()
                .unwrap()
                .sessions
                .get(session_id)
                .cloned()
                .ok_or_else(|| StoreError::SessionNotFound(session_id.clone()))
        })
    }

    fn tickets_for_session<'a>(
        &'a self,
        session_id: &'a SessionId,
    ) -> BoxFuture<'a, Result<Vec<Ticket>, StoreError>> {
        Box::pin(async move {
            self.check_available()?;
            Ok(Self::session_tickets(&self.tables.read().unwrap(), session_id))
        })
    }

    fn record_purchase<'a>(
        &'a self,
        session_id: &'a SessionId,
        payment_id: PaymentId,
        tickets: Vec<Ticket>,
    ) -> BoxFuture<'a, Result<Vec<Ticket>, StoreError>> {
        Box::pin(async move {
            self.check_available()?;
            let mut tables = self.tables.write().unwrap();
            let status = tables
                .sessions
                .get(session_id)
                .map(|session| session.status)
                .ok_or_else(|| StoreError::SessionNotFound(session_id.clone()))?;

            if status != CheckoutStatus::Pending {
                return Ok(Self::session_tickets(&tables, session_id));
            }

            let seats: Vec<SeatKey> = tickets
                .iter()
                .map(Ticket::seat_key)
                .filter(|key| tables.tickets.values().any(|existing| existing.seat_key() == *key))
                .collect();
            if !seats.is_empty() {
                return Err(StoreError::AlreadyTicketed { seats });
            }

            if let Some(session) = tables.sessions.get_mut(session_id) {
                session.status = CheckoutStatus::Verified;
                session.payment_id = Some(payment_id);
            }
            for ticket in &tickets {
                tables.tickets.insert(ticket.ticket_id, ticket.clone());
                Self::link(&mut tables, session_id, ticket.ticket_id);
            }
            Ok(tickets)
        })
    }

    fn record_resale<'a>(
        &'a self,
        session_id: &'a SessionId,
        payment_id: PaymentId,
        ticket_id: TicketId,
        buyer: ShopperId,
    ) -> BoxFuture<'a, Result<Ticket, StoreError>> {
        Box::pin(async move {
            self.check_available()?;
            let mut tables = self.tables.write().unwrap();
            let status = tables
                .sessions
                .get(session_id)
                .map(|session| session.status)
                .ok_or_else(|| StoreError::SessionNotFound(session_id.clone()))?;

            if status != CheckoutStatus::Pending {
                return tables
                    .tickets
                    .get(&ticket_id)
                    .cloned()
                    .ok_or(StoreError::TicketNotFound(ticket_id));
            }

            let ticket = tables
                .tickets
                .get_mut(&ticket_id)
                .ok_or(StoreError::TicketNotFound(ticket_id))?;
            if ticket.status != TicketStatus::ResaleListed {
                return Err(StoreError::TicketConflict {
                    ticket_id,
                    expected: TicketStatus::ResaleListed,
                    actual: ticket.status,
                });
            }
            ticket.owner_id = buyer;
            ticket.status = TicketStatus::Confirmed;
            ticket.resale_price = None;
            ticket.payment_id = payment_id.clone();
            ticket.session_id = session_id.clone();
            let ticket = ticket.clone();
            Self::link(&mut tables, session_id, ticket_id);

            if let Some(session) = tables.sessions.get_mut(session_id) {
                session.status = CheckoutStatus::Verified;
                session.payment_id = Some(payment_id);
            }
            Ok(ticket)
        })
    }

    fn mark_failed<'a>(
        &'a self,
        session_id: &'a SessionId,
        payment_id: Option<PaymentId>,
    ) -> BoxFuture<'a, Result<(), StoreError>> {
        Box::pin(async move {
            self.check_available()?;
            let mut tables = self.tables.write().unwrap();
            let session = tables
                .sessions
                .get_mut(session_id)
                .ok_or_else(|| StoreError::SessionNotFound(session_id.clone()))?;
            if session.status == CheckoutStatus::Pending {
                session.status = CheckoutStatus::Failed;
                session.payment_id = payment_id;
            }
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{SeatMapBuilder, test_showtime};
    use crate::test_clock;
    use boxoffice_core::environment::Clock;
    use boxoffice_core::types::{SeatCategory, SeatNo};
    use chrono::Duration;

    fn seeded() -> (InMemoryStore, Showtime) {
        let store = InMemoryStore::new();
        let showtime = test_showtime();
        let seats = SeatMapBuilder::new(showtime.clone())
            .category(SeatCategory::A, 1..=3, Money::from_cents(5000))
            .build();
        tokio_test::block_on(store.seed_seats(seats)).unwrap();
        (store, showtime)
    }

    #[test]
    fn test_second_claim_conflicts() {
        let (store, showtime) = seeded();
        let now = test_clock().now();
        let key = showtime.seat(SeatNo(1));
        let claim = |who: &str| {
            SeatTransition::new(key.clone(), SeatStatus::Available, SeatStatus::Held)
                .claim(ShopperId::new(who), now + Duration::minutes(10))
        };

        tokio_test::block_on(store.transition(claim("alice"), now)).unwrap();
        let err = tokio_test::block_on(store.transition(claim("bob"), now)).unwrap_err();

        assert_eq!(
            err,
            StoreError::Conflict {
                seat: key.clone(),
                expected: SeatStatus::Available,
                actual: SeatStatus::Held,
            }
        );
        assert_eq!(store.seat(&key).unwrap().holder, Some(ShopperId::new("alice")));
    }

    #[test]
    fn test_holder_guard_blocks_other_shopper() {
        let (store, showtime) = seeded();
        let now = test_clock().now();
        let key = showtime.seat(SeatNo(2));
        tokio_test::block_on(store.transition(
            SeatTransition::new(key.clone(), SeatStatus::Available, SeatStatus::Held)
                .claim(ShopperId::new("alice"), now + Duration::minutes(10)),
            now,
        ))
        .unwrap();

        let release = SeatTransition::new(key.clone(), SeatStatus::Held, SeatStatus::Available)
            .guarded_by(ShopperId::new("bob"))
            .release();
        assert!(tokio_test::block_on(store.transition(release, now)).is_err());
        assert_eq!(store.seat(&key).unwrap().status, SeatStatus::Held);
    }

    #[test]
    fn test_sweep_releases_only_lapsed_holds_and_audits_them() {
        let (store, showtime) = seeded();
        let now = test_clock().now();
        for (no, minutes) in [(1, 1), (2, 20)] {
            tokio_test::block_on(store.transition(
                SeatTransition::new(showtime.seat(SeatNo(no)), SeatStatus::Available, SeatStatus::Held)
                    .claim(ShopperId::new("alice"), now + Duration::minutes(minutes)),
                now,
            ))
            .unwrap();
        }

        let released =
            tokio_test::block_on(store.expire_holds(now + Duration::minutes(5), None)).unwrap();

        assert_eq!(released, vec![showtime.seat(SeatNo(1))]);
        assert_eq!(store.count_status(&showtime, SeatStatus::Held), 1);
        let trail = tokio_test::block_on(store.audit_trail(&showtime.seat(SeatNo(1)))).unwrap();
        assert_eq!(trail.len(), 2);
        assert_eq!(trail[1].to, SeatStatus::Available);
    }

    #[test]
    fn test_outage_fails_every_call() {
        let (store, showtime) = seeded();
        store.set_unavailable(true);
        assert!(tokio_test::block_on(store.ping()).is_err());
        assert!(tokio_test::block_on(store.list_seats(&showtime)).is_err());
        store.set_unavailable(false);
        assert!(tokio_test::block_on(store.ping()).is_ok());
    }
}
