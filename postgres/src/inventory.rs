//! `InventoryStore` over the `seats` and `seat_transitions` tables.

use crate::rows::{self, cents_to_db, seat_columns, seat_no_to_db};
use crate::{PostgresStore, db_error};
use boxoffice_core::BoxFuture;
use boxoffice_core::store::{HolderChange, InventoryStore, ListingChange, SeatTransition, StoreError};
use boxoffice_core::types::{Seat, SeatKey, SeatTransitionRecord, ShopperId, Showtime};
use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Column values for a holder change: `(apply, holder, expires_at)`.
fn holder_params(change: &HolderChange) -> (bool, Option<String>, Option<DateTime<Utc>>) {
    match change {
        HolderChange::Keep => (false, None, None),
        HolderChange::Clear => (true, None, None),
        HolderChange::Set { holder, expires_at } => (true, Some(holder.to_string()), *expires_at),
    }
}

/// Column values for a listing change: `(apply, ticket, seller, price)`.
fn listing_params(
    change: &ListingChange,
) -> Result<(bool, Option<Uuid>, Option<String>, Option<i64>), StoreError> {
    Ok(match change {
        ListingChange::Keep => (false, None, None, None),
        ListingChange::Clear => (true, None, None, None),
        ListingChange::Set(listing) => (
            true,
            Some(*listing.ticket_id.as_uuid()),
            Some(listing.seller.to_string()),
            Some(cents_to_db(listing.price)?),
        ),
    })
}

impl PostgresStore {
    async fn apply_transition(
        &self,
        transition: SeatTransition,
        at: DateTime<Utc>,
    ) -> Result<Seat, StoreError> {
        let seat_no = seat_no_to_db(transition.seat.seat_no)?;
        let (set_holder, holder, expires_at) = holder_params(&transition.holder);
        let (set_listing, listing_ticket, listing_seller, listing_price) =
            listing_params(&transition.listing)?;

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(db_error("Failed to begin transaction"))?;

        let updated = sqlx::query(concat!(
            "UPDATE seats SET
                status = $5,
                holder_id = CASE WHEN $7::BOOLEAN THEN $8::TEXT ELSE holder_id END,
                hold_expires_at = CASE WHEN $7::BOOLEAN THEN $9::TIMESTAMPTZ ELSE hold_expires_at END,
                listing_ticket_id = CASE WHEN $10::BOOLEAN THEN $11::UUID ELSE listing_ticket_id END,
                listing_seller_id = CASE WHEN $10::BOOLEAN THEN $12::TEXT ELSE listing_seller_id END,
                listing_price_cents = CASE WHEN $10::BOOLEAN THEN $13::BIGINT ELSE listing_price_cents END
             WHERE event_id = $1 AND event_datetime = $2 AND seat_no = $3
               AND status = $4
               AND ($6::TEXT IS NULL OR holder_id = $6::TEXT)
             RETURNING ",
            seat_columns!()
        ))
        .bind(transition.seat.event_id.as_str())
        .bind(transition.seat.event_datetime)
        .bind(seat_no)
        .bind(transition.from.as_str())
        .bind(transition.to.as_str())
        .bind(transition.expected_holder.as_ref().map(ShopperId::as_str))
        .bind(set_holder)
        .bind(holder)
        .bind(expires_at)
        .bind(set_listing)
        .bind(listing_ticket)
        .bind(listing_seller)
        .bind(listing_price)
        .fetch_optional(&mut *tx)
        .await
        .map_err(db_error("Failed to transition seat"))?;

        let Some(row) = updated else {
            drop(tx);
            let current = self.fetch_seat(&transition.seat).await?;
            metrics::counter!("store.seat_transition.conflicts").increment(1);
            tracing::debug!(
                seat = %transition.seat,
                expected = %transition.from,
                actual = %current.status,
                "Seat transition rejected"
            );
            return Err(StoreError::Conflict {
                seat: transition.seat,
                expected: transition.from,
                actual: current.status,
            });
        };
        let seat = rows::seat(&row)?;

        sqlx::query(
            "INSERT INTO seat_transitions
                (event_id, event_datetime, seat_no, from_status, to_status, holder_id, at)
             VALUES ($1, $2, $3, $4, $5, $6, $7)",
        )
        .bind(seat.key.event_id.as_str())
        .bind(seat.key.event_datetime)
        .bind(seat_no)
        .bind(transition.from.as_str())
        .bind(transition.to.as_str())
        .bind(seat.holder.as_ref().map(ShopperId::as_str))
        .bind(at)
        .execute(&mut *tx)
        .await
        .map_err(db_error("Failed to append seat transition"))?;

        tx.commit()
            .await
            .map_err(db_error("Failed to commit seat transition"))?;

        Ok(seat)
    }

    async fn fetch_seat(&self, key: &SeatKey) -> Result<Seat, StoreError> {
        let row = sqlx::query(concat!(
            "SELECT ",
            seat_columns!(),
            " FROM seats WHERE event_id = $1 AND event_datetime = $2 AND seat_no = $3"
        ))
        .bind(key.event_id.as_str())
        .bind(key.event_datetime)
        .bind(seat_no_to_db(key.seat_no)?)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error("Failed to load seat"))?
        .ok_or_else(|| StoreError::SeatNotFound(key.clone()))?;

        rows::seat(&row)
    }
}

impl InventoryStore for PostgresStore {
    fn seed_seats(&self, seats: Vec<Seat>) -> BoxFuture<'_, Result<(), StoreError>> {
        Box::pin(async move {
            let mut tx = self
                .pool
                .begin()
                .await
                .map_err(db_error("Failed to begin transaction"))?;

            for seat in &seats {
                sqlx::query(
                    "INSERT INTO seats (event_id, event_datetime, seat_no, category, price_cents, status)
                     VALUES ($1, $2, $3, $4, $5, 'available')
                     ON CONFLICT (event_id, event_datetime, seat_no) DO NOTHING",
                )
                .bind(seat.key.event_id.as_str())
                .bind(seat.key.event_datetime)
                .bind(seat_no_to_db(seat.key.seat_no)?)
                .bind(seat.category.as_str())
                .bind(cents_to_db(seat.price)?)
                .execute(&mut *tx)
                .await
                .map_err(db_error("Failed to seed seat"))?;
            }

            tx.commit().await.map_err(db_error("Failed to commit seat map"))?;
            tracing::info!(seats = seats.len(), "Seat map seeded");
            Ok(())
        })
    }

    fn list_seats<'a>(&'a self, showtime: &'a Showtime) -> BoxFuture<'a, Result<Vec<Seat>, StoreError>> {
        Box::pin(async move {
            let rows = sqlx::query(concat!(
                "SELECT ",
                seat_columns!(),
                " FROM seats WHERE event_id = $1 AND event_datetime = $2 ORDER BY seat_no"
            ))
            .bind(showtime.event_id.as_str())
            .bind(showtime.event_datetime)
            .fetch_all(&self.pool)
            .await
            .map_err(db_error("Failed to list seats"))?;

            rows.iter().map(rows::seat).collect()
        })
    }

    fn get_seat<'a>(&'a self, seat: &'a SeatKey) -> BoxFuture<'a, Result<Seat, StoreError>> {
        Box::pin(self.fetch_seat(seat))
    }

    fn holds_for<'a>(
        &'a self,
        holder: &'a ShopperId,
        showtime: &'a Showtime,
    ) -> BoxFuture<'a, Result<Vec<Seat>, StoreError>> {
        Box::pin(async move {
            let rows = sqlx::query(concat!(
                "SELECT ",
                seat_columns!(),
                " FROM seats
                  WHERE event_id = $1 AND event_datetime = $2 AND holder_id = $3
                    AND status IN ('held', 'reserved')
                  ORDER BY seat_no"
            ))
            .bind(showtime.event_id.as_str())
            .bind(showtime.event_datetime)
            .bind(holder.as_str())
            .fetch_all(&self.pool)
            .await
            .map_err(db_error("Failed to load holds"))?;

            rows.iter().map(rows::seat).collect()
        })
    }

    fn transition(
        &self,
        transition: SeatTransition,
        at: DateTime<Utc>,
    ) -> BoxFuture<'_, Result<Seat, StoreError>> {
        Box::pin(self.apply_transition(transition, at))
    }

    fn expire_holds<'a>(
        &'a self,
        now: DateTime<Utc>,
        scope: Option<&'a Showtime>,
    ) -> BoxFuture<'a, Result<Vec<SeatKey>, StoreError>> {
        Box::pin(async move {
            // One statement: lock lapsed holds, revert them, audit the reverts.
            let rows = sqlx::query(
                "WITH expired AS (
                    SELECT event_id, event_datetime, seat_no, status
                      FROM seats
                     WHERE status IN ('held', 'reserved', 'reserved_for_resale')
                       AND hold_expires_at <= $1
                       AND ($2::TEXT IS NULL OR (event_id = $2::TEXT AND event_datetime = $3::TIMESTAMPTZ))
                     FOR UPDATE SKIP LOCKED
                 ),
                 released AS (
                    UPDATE seats s SET
                        status = CASE WHEN e.status = 'reserved_for_resale'
                                      THEN 'resale_listed' ELSE 'available' END,
                        holder_id = CASE WHEN e.status = 'reserved_for_resale'
                                         THEN s.listing_seller_id ELSE NULL END,
                        hold_expires_at = NULL
                      FROM expired e
                     WHERE s.event_id = e.event_id
                       AND s.event_datetime = e.event_datetime
                       AND s.seat_no = e.seat_no
                    RETURNING s.event_id, s.event_datetime, s.seat_no,
                              e.status AS from_status, s.status AS to_status, s.holder_id
                 )
                 INSERT INTO seat_transitions
                    (event_id, event_datetime, seat_no, from_status, to_status, holder_id, at)
                 SELECT event_id, event_datetime, seat_no, from_status, to_status, holder_id, $1
                   FROM released
                 RETURNING event_id, event_datetime, seat_no",
            )
            .bind(now)
            .bind(scope.map(|showtime| showtime.event_id.as_str()))
            .bind(scope.map(|showtime| showtime.event_datetime))
            .fetch_all(&self.pool)
            .await
            .map_err(db_error("Failed to expire holds"))?;

            let released: Vec<SeatKey> = rows.iter().map(rows::seat_key).collect::<Result<_, _>>()?;
            if !released.is_empty() {
                metrics::counter!("store.holds.expired").increment(released.len() as u64);
            }
            Ok(released)
        })
    }

    fn audit_trail<'a>(
        &'a self,
        seat: &'a SeatKey,
    ) -> BoxFuture<'a, Result<Vec<SeatTransitionRecord>, StoreError>> {
        Box::pin(async move {
            let rows = sqlx::query(
                "SELECT event_id, event_datetime, seat_no, from_status, to_status, holder_id, at
                   FROM seat_transitions
                  WHERE event_id = $1 AND event_datetime = $2 AND seat_no = $3
                  ORDER BY id",
            )
            .bind(seat.event_id.as_str())
            .bind(seat.event_datetime)
            .bind(seat_no_to_db(seat.seat_no)?)
            .fetch_all(&self.pool)
            .await
            .map_err(db_error("Failed to load audit trail"))?;

            rows.iter().map(rows::transition_record).collect()
        })
    }

    fn ping(&self) -> BoxFuture<'_, Result<(), StoreError>> {
        Box::pin(async move {
            sqlx::query("SELECT 1")
                .execute(&self.pool)
                .await
                .map_err(db_error("Database unreachable"))?;
            Ok(())
        })
    }
}
