//! `TicketStore` and `CheckoutStore` over the `tickets` and `checkout_sessions` tables.

use crate::rows::{self, cents_to_db, seat_no_to_db, session_columns, ticket_columns};
use crate::{PostgresStore, db_error};
use boxoffice_core::BoxFuture;
use boxoffice_core::store::{CheckoutStore, StoreError, TicketStore};
use boxoffice_core::types::{
    CheckoutSession, Money, PaymentId, SeatKey, SessionId, ShopperId, Ticket, TicketId, TicketStatus,
};
use sqlx::types::Json;
use sqlx::{Postgres, Transaction};

impl PostgresStore {
    async fn fetch_ticket(&self, ticket_id: TicketId) -> Result<Ticket, StoreError> {
        let row = sqlx::query(concat!("SELECT ", ticket_columns!(), " FROM tickets WHERE ticket_id = $1"))
            .bind(ticket_id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(db_error("Failed to load ticket"))?
            .ok_or(StoreError::TicketNotFound(ticket_id))?;

        rows::ticket(&row)
    }

    async fn fetch_session_tickets(&self, session_id: &SessionId) -> Result<Vec<Ticket>, StoreError> {
        let rows = sqlx::query(concat!(
            "SELECT ",
            ticket_columns!(),
            " FROM tickets WHERE ticket_id IN
                (SELECT ticket_id FROM session_tickets WHERE session_id = $1)
              ORDER BY seat_no"
        ))
        .bind(session_id.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(db_error("Failed to load session tickets"))?;

        rows.iter().map(rows::ticket).collect()
    }

    async fn session_exists(&self, session_id: &SessionId) -> Result<bool, StoreError> {
        let (exists,): (bool,) =
            sqlx::query_as("SELECT EXISTS(SELECT 1 FROM checkout_sessions WHERE session_id = $1)")
                .bind(session_id.as_str())
                .fetch_one(&self.pool)
                .await
                .map_err(db_error("Failed to check session"))?;
        Ok(exists)
    }

    /// Flip a session `pending → verified`. Returns `false` if it was not pending.
    async fn claim_session(
        tx: &mut Transaction<'static, Postgres>,
        session_id: &SessionId,
        payment_id: &PaymentId,
    ) -> Result<bool, StoreError> {
        let result = sqlx::query(
            "UPDATE checkout_sessions SET status = 'verified', payment_id = $2
              WHERE session_id = $1 AND status = 'pending'",
        )
        .bind(session_id.as_str())
        .bind(payment_id.as_str())
        .execute(&mut **tx)
        .await
        .map_err(db_error("Failed to verify session"))?;
        Ok(result.rows_affected() == 1)
    }

    async fn link_ticket(
        tx: &mut Transaction<'static, Postgres>,
        session_id: &SessionId,
        ticket_id: TicketId,
    ) -> Result<(), StoreError> {
        sqlx::query("INSERT INTO session_tickets (session_id, ticket_id) VALUES ($1, $2)")
            .bind(session_id.as_str())
            .bind(ticket_id.as_uuid())
            .execute(&mut **tx)
            .await
            .map_err(db_error("Failed to link ticket to session"))?;
        Ok(())
    }

    /// Seats among `tickets` that already carry a ticket.
    async fn ticketed_seats(
        tx: &mut Transaction<'static, Postgres>,
        tickets: &[Ticket],
    ) -> Result<Vec<SeatKey>, StoreError> {
        let mut seats = Vec::new();
        for ticket in tickets {
            let (taken,): (bool,) = sqlx::query_as(
                "SELECT EXISTS(SELECT 1 FROM tickets
                  WHERE event_id = $1 AND event_datetime = $2 AND seat_no = $3)",
            )
            .bind(ticket.event_id.as_str())
            .bind(ticket.event_datetime)
            .bind(seat_no_to_db(ticket.seat_no)?)
            .fetch_one(&mut **tx)
            .await
            .map_err(db_error("Failed to check seat tickets"))?;
            if taken {
                seats.push(ticket.seat_key());
            }
        }
        Ok(seats)
    }

    async fn move_ticket(
        &self,
        ticket_id: TicketId,
        from: TicketStatus,
        to: TicketStatus,
        resale_price: Option<Money>,
    ) -> Result<Ticket, StoreError> {
        let resale_price = resale_price.map(cents_to_db).transpose()?;
        let row = sqlx::query(concat!(
            "UPDATE tickets SET
                status = $3::TEXT,
                resale_price_cents = CASE
                    WHEN $3::TEXT = 'resale_listed' THEN $4::BIGINT
                    WHEN $3::TEXT = 'confirmed' THEN NULL
                    ELSE resale_price_cents END,
                is_checked_in = is_checked_in OR $3::TEXT = 'checked_in'
              WHERE ticket_id = $1 AND status = $2
              RETURNING ",
            ticket_columns!()
        ))
        .bind(ticket_id.as_uuid())
        .bind(from.as_str())
        .bind(to.as_str())
        .bind(resale_price)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error("Failed to transition ticket"))?;

        match row {
            Some(row) => rows::ticket(&row),
            None => {
                let current = self.fetch_ticket(ticket_id).await?;
                Err(StoreError::TicketConflict {
                    ticket_id,
                    expected: from,
                    actual: current.status,
                })
            }
        }
    }

    async fn insert_purchase(
        &self,
        session_id: &SessionId,
        payment_id: PaymentId,
        tickets: Vec<Ticket>,
    ) -> Result<Vec<Ticket>, StoreError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(db_error("Failed to begin transaction"))?;

        if !Self::claim_session(&mut tx, session_id, &payment_id).await? {
            drop(tx);
            if !self.session_exists(session_id).await? {
                return Err(StoreError::SessionNotFound(session_id.clone()));
            }
            tracing::debug!(session_id = %session_id, "Session already reconciled");
            return self.fetch_session_tickets(session_id).await;
        }

        let taken = Self::ticketed_seats(&mut tx, &tickets).await?;
        if !taken.is_empty() {
            drop(tx);
            return Err(StoreError::AlreadyTicketed { seats: taken });
        }

        for ticket in &tickets {
            sqlx::query(concat!(
                "INSERT INTO tickets (",
                ticket_columns!(),
                ") VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)"
            ))
            .bind(ticket.ticket_id.as_uuid())
            .bind(ticket.owner_id.as_str())
            .bind(ticket.event_id.as_str())
            .bind(&ticket.event_name)
            .bind(ticket.event_datetime)
            .bind(seat_no_to_db(ticket.seat_no)?)
            .bind(ticket.seat_category.as_str())
            .bind(cents_to_db(ticket.price)?)
            .bind(ticket.resale_price.map(cents_to_db).transpose()?)
            .bind(ticket.payment_id.as_str())
            .bind(ticket.session_id.as_str())
            .bind(ticket.is_checked_in)
            .bind(ticket.status.as_str())
            .bind(ticket.purchased_at)
            .execute(&mut *tx)
            .await
            .map_err(|e| match e {
                // Lost a race with another session inserting the same seat
                sqlx::Error::Database(db) if db.is_unique_violation() => StoreError::AlreadyTicketed {
                    seats: vec![ticket.seat_key()],
                },
                other => StoreError::DatabaseError(format!("Failed to insert ticket: {other}")),
            })?;
            Self::link_ticket(&mut tx, session_id, ticket.ticket_id).await?;
        }

        tx.commit().await.map_err(db_error("Failed to commit purchase"))?;
        metrics::counter!("store.tickets.issued").increment(tickets.len() as u64);
        Ok(tickets)
    }

    async fn transfer_ticket(
        &self,
        session_id: &SessionId,
        payment_id: PaymentId,
        ticket_id: TicketId,
        buyer: ShopperId,
    ) -> Result<Ticket, StoreError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(db_error("Failed to begin transaction"))?;

        if !Self::claim_session(&mut tx, session_id, &payment_id).await? {
            drop(tx);
            if !self.session_exists(session_id).await? {
                return Err(StoreError::SessionNotFound(session_id.clone()));
            }
            return self.fetch_ticket(ticket_id).await;
        }

        let row = sqlx::query(concat!(
            "UPDATE tickets SET
                owner_id = $2, status = 'confirmed', resale_price_cents = NULL,
                payment_id = $3, session_id = $4
              WHERE ticket_id = $1 AND status = 'resale_listed'
              RETURNING ",
            ticket_columns!()
        ))
        .bind(ticket_id.as_uuid())
        .bind(buyer.as_str())
        .bind(payment_id.as_str())
        .bind(session_id.as_str())
        .fetch_optional(&mut *tx)
        .await
        .map_err(db_error("Failed to transfer ticket"))?;

        let Some(row) = row else {
            drop(tx);
            let current = self.fetch_ticket(ticket_id).await?;
            return Err(StoreError::TicketConflict {
                ticket_id,
                expected: TicketStatus::ResaleListed,
                actual: current.status,
            });
        };

        let ticket = rows::ticket(&row)?;
        Self::link_ticket(&mut tx, session_id, ticket_id).await?;
        tx.commit().await.map_err(db_error("Failed to commit resale"))?;
        Ok(ticket)
    }
}

impl TicketStore for PostgresStore {
    fn get_ticket(&self, ticket_id: TicketId) -> BoxFuture<'_, Result<Ticket, StoreError>> {
        Box::pin(self.fetch_ticket(ticket_id))
    }

    fn tickets_for_owner<'a>(
        &'a self,
        owner: &'a ShopperId,
    ) -> BoxFuture<'a, Result<Vec<Ticket>, StoreError>> {
        Box::pin(async move {
            let rows = sqlx::query(concat!(
                "SELECT ",
                ticket_columns!(),
                " FROM tickets WHERE owner_id = $1 ORDER BY event_datetime, seat_no"
            ))
            .bind(owner.as_str())
            .fetch_all(&self.pool)
            .await
            .map_err(db_error("Failed to load owner tickets"))?;

            rows.iter().map(rows::ticket).collect()
        })
    }

    fn transition_ticket(
        &self,
        ticket_id: TicketId,
        from: TicketStatus,
        to: TicketStatus,
        resale_price: Option<Money>,
    ) -> BoxFuture<'_, Result<Ticket, StoreError>> {
        Box::pin(self.move_ticket(ticket_id, from, to, resale_price))
    }
}

impl CheckoutStore for PostgresStore {
    fn create_session(&self, session: CheckoutSession) -> BoxFuture<'_, Result<(), StoreError>> {
        Box::pin(async move {
            sqlx::query(concat!(
                "INSERT INTO checkout_sessions (",
                session_columns!(),
                ") VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16)"
            ))
            .bind(session.session_id.as_str())
            .bind(session.holder.as_str())
            .bind(session.event_id.as_str())
            .bind(session.event_datetime)
            .bind(&session.event_name)
            .bind(Json(&session.lines))
            .bind(Json(&session.attendees))
            .bind(cents_to_db(session.amount)?)
            .bind(&session.currency)
            .bind(&session.success_url)
            .bind(&session.cancel_url)
            .bind(&session.checkout_url)
            .bind(Json(&session.kind))
            .bind(session.status.as_str())
            .bind(session.payment_id.as_ref().map(PaymentId::as_str))
            .bind(session.created_at)
            .execute(&self.pool)
            .await
            .map_err(|e| match e {
                sqlx::Error::Database(db) if db.is_unique_violation() => {
                    StoreError::Duplicate(session.session_id.to_string())
                }
                other => StoreError::DatabaseError(format!("Failed to create session: {other}")),
            })?;
            Ok(())
        })
    }

    fn get_session<'a>(
        &'a self,
        session_id: &'a SessionId,
    ) -> BoxFuture<'a, Result<CheckoutSession, StoreError>> {
        Box::pin(async move {
            let row = sqlx::query(concat!(
                "SELECT ",
                session_columns!(),
                " FROM checkout_sessions WHERE session_id = $1"
            ))
            .bind(session_id.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(db_error("Failed to load session"))?
            .ok_or_else(|| StoreError::SessionNotFound(session_id.clone()))?;

            rows::session(&row)
        })
    }

    fn tickets_for_session<'a>(
        &'a self,
        session_id: &'a SessionId,
    ) -> BoxFuture<'a, Result<Vec<Ticket>, StoreError>> {
        Box::pin(self.fetch_session_tickets(session_id))
    }

    fn record_purchase<'a>(
        &'a self,
        session_id: &'a SessionId,
        payment_id: PaymentId,
        tickets: Vec<Ticket>,
    ) -> BoxFuture<'a, Result<Vec<Ticket>, StoreError>> {
        Box::pin(self.insert_purchase(session_id, payment_id, tickets))
    }

    fn record_resale<'a>(
        &'a self,
        session_id: &'a SessionId,
        payment_id: PaymentId,
        ticket_id: TicketId,
        buyer: ShopperId,
    ) -> BoxFuture<'a, Result<Ticket, StoreError>> {
        Box::pin(self.transfer_ticket(session_id, payment_id, ticket_id, buyer))
    }

    fn mark_failed<'a>(
        &'a self,
        session_id: &'a SessionId,
        payment_id: Option<PaymentId>,
    ) -> BoxFuture<'a, Result<(), StoreError>> {
        Box::pin(async move {
            let result = sqlx::query(
                "UPDATE checkout_sessions SET status = 'failed', payment_id = $2
                  WHERE session_id = $1 AND status = 'pending'",
            )
            .bind(session_id.as_str())
            .bind(payment_id.as_ref().map(PaymentId::as_str))
            .execute(&self.pool)
            .await
            .map_err(db_error("Failed to mark session failed"))?;

            if result.rows_affected() == 0 && !self.session_exists(session_id).await? {
                return Err(StoreError::SessionNotFound(session_id.clone()));
            }
            Ok(())
        })
    }
}
