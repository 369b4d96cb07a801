//! Resale of sold tickets.
//!
//! A listed ticket's seat goes back on sale at the owner's price. A buyer
//! reserves it for the hold TTL, pays through the same provider handoff as a
//! primary checkout, and ownership is transferred on verification. A lapsed
//! buyer reservation returns the seat to `resale_listed`, never `available`.

use super::TicketingEnvironment;
use super::checkout::{CheckoutOrchestrator, CheckoutSettings, CheckoutStarted, line_item};
use crate::config::ReservationConfig;
use crate::error::{TicketingError, TicketingResult};
use crate::metrics;
use crate::validation::{resale_price, validate_attendees};
use boxoffice_core::collaborators::SettlementRecord;
use boxoffice_core::payment::CheckoutRequest;
use boxoffice_core::store::{SeatTransition, StoreError};
use boxoffice_core::types::{
    Attendee, CheckoutKind, CheckoutLine, CheckoutSession, CheckoutStatus, Hold, PaymentId,
    ResaleListing, Seat, SeatKey, SeatStatus, SessionId, ShopperId, Ticket, TicketId, TicketStatus,
};
use std::sync::Arc;

/// Resale listing manager.
#[derive(Clone)]
pub struct ResaleManager {
    env: Arc<TicketingEnvironment>,
    config: ReservationConfig,
    checkout: CheckoutOrchestrator,
}

impl ResaleManager {
    /// Creates a new `ResaleManager`
    #[must_use]
    pub fn new(env: Arc<TicketingEnvironment>, config: ReservationConfig, settings: CheckoutSettings) -> Self {
        Self {
            checkout: CheckoutOrchestrator::new(Arc::clone(&env), settings),
            env,
            config,
        }
    }

    /// Put an owned ticket back on sale at `price`.
    ///
    /// # Errors
    ///
    /// - `TicketNotFound`, `NotOwner`
    /// - `AlreadyCheckedIn`, `AlreadyListed`
    /// - `InvalidResalePrice`: Negative, zero or non-finite price
    /// - `Conflict`: The seat changed underneath; the ticket stays confirmed
    pub async fn list_for_resale(&self, owner: &ShopperId, ticket_id: TicketId, price: f64) -> TicketingResult<Ticket> {
        let ticket = self.env.tickets.get_ticket(ticket_id).await?;
        if ticket.owner_id != *owner {
            return Err(TicketingError::NotOwner(ticket_id));
        }
        match ticket.status {
            TicketStatus::CheckedIn => return Err(TicketingError::AlreadyCheckedIn(ticket_id)),
            TicketStatus::ResaleListed => return Err(TicketingError::AlreadyListed(ticket_id)),
            TicketStatus::Confirmed => {}
        }
        let price = resale_price(price)?;

        let listed = self
            .env
            .tickets
            .transition_ticket(ticket_id, TicketStatus::Confirmed, TicketStatus::ResaleListed, Some(price))
            .await
            .map_err(|error| ticket_conflict(ticket_id, error))?;

        let key = ticket.seat_key();
        let seat_listing = SeatTransition::new(key.clone(), SeatStatus::Sold, SeatStatus::ResaleListed)
            .guarded_by(owner.clone())
            .list(ResaleListing {
                ticket_id,
                seller: owner.clone(),
                price,
            });
        if let Err(error) = self.env.inventory.transition(seat_listing, self.env.clock.now()).await {
            tracing::warn!(ticket_id = %ticket_id, seat = %key, error = %error, "Seat listing failed, restoring ticket");
            if let Err(restore) = self
                .env
                .tickets
                .transition_ticket(ticket_id, TicketStatus::ResaleListed, TicketStatus::Confirmed, None)
                .await
            {
                tracing::error!(ticket_id = %ticket_id, error = %restore, "Could not restore ticket after failed listing");
            }
            return Err(match error {
                StoreError::Conflict { actual, .. } => {
                    TicketingError::Conflict(format!("seat {key} is {actual}, cannot list"))
                }
                other => other.into(),
            });
        }

        tracing::info!(ticket_id = %ticket_id, seller = %owner, price = %price, "Ticket listed for resale");
        metrics::record_resale_listing("listed");
        Ok(listed)
    }

    /// Take a listing off sale.
    ///
    /// # Errors
    ///
    /// - `TicketNotFound`, `NotOwner`
    /// - `Conflict`: Ticket is not listed
    /// - `SeatUnavailable`: A buyer currently has the listing reserved
    pub async fn withdraw_listing(&self, owner: &ShopperId, ticket_id: TicketId) -> TicketingResult<Ticket> {
        let ticket = self.env.tickets.get_ticket(ticket_id).await?;
        if ticket.owner_id != *owner {
            return Err(TicketingError::NotOwner(ticket_id));
        }
        if ticket.status != TicketStatus::ResaleListed {
            return Err(TicketingError::Conflict(format!("ticket {ticket_id} is not listed")));
        }

        let key = ticket.seat_key();
        let now = self.env.clock.now();
        self.env.inventory.expire_holds(now, Some(&key.showtime())).await?;

        let delist = SeatTransition::new(key.clone(), SeatStatus::ResaleListed, SeatStatus::Sold)
            .guarded_by(owner.clone())
            .delist();
        match self.env.inventory.transition(delist, now).await {
            Ok(_) => {}
            Err(StoreError::Conflict { actual, .. }) => {
                return Err(TicketingError::SeatUnavailable {
                    seat: key,
                    status: actual.public(),
                });
            }
            Err(other) => return Err(other.into()),
        }

        let ticket = self
            .env
            .tickets
            .transition_ticket(ticket_id, TicketStatus::ResaleListed, TicketStatus::Confirmed, None)
            .await
            .map_err(|error| ticket_conflict(ticket_id, error))?;

        tracing::info!(ticket_id = %ticket_id, seller = %owner, "Resale listing withdrawn");
        metrics::record_resale_listing("withdrawn");
        Ok(ticket)
    }

    /// Reserve a listed ticket for `buyer`.
    ///
    /// Reserving a listing the buyer already holds returns the existing hold.
    ///
    /// # Errors
    ///
    /// - `TicketNotFound`
    /// - `SeatUnavailable`: Not listed, reserved by someone else, or the buyer is the seller
    pub async fn reserve_resale(&self, buyer: &ShopperId, ticket_id: TicketId) -> TicketingResult<Hold> {
        let ticket = self.env.tickets.get_ticket(ticket_id).await?;
        let key = ticket.seat_key();
        let now = self.env.clock.now();

        let mut seat = self.env.inventory.get_seat(&key).await?;
        if seat.hold_expired(now) {
            self.env.inventory.expire_holds(now, Some(&key.showtime())).await?;
            seat = self.env.inventory.get_seat(&key).await?;
        }

        if ticket.owner_id == *buyer {
            return Err(TicketingError::SeatUnavailable {
                seat: key,
                status: seat.status.public(),
            });
        }
        if seat.status == SeatStatus::ReservedForResale && seat.is_held_by(buyer) {
            if let Some(expires_at) = seat.hold_expires_at {
                return Ok(Hold {
                    holder: buyer.clone(),
                    seats: vec![key],
                    expires_at,
                });
            }
        }
        if seat.status != SeatStatus::ResaleListed || !listing_matches(&seat, ticket_id) {
            return Err(TicketingError::SeatUnavailable {
                seat: key,
                status: seat.status.public(),
            });
        }

        let expires_at = now + self.config.hold_ttl();
        let reserve = SeatTransition::new(key.clone(), SeatStatus::ResaleListed, SeatStatus::ReservedForResale)
            .claim(buyer.clone(), expires_at);
        match self.env.inventory.transition(reserve, now).await {
            Ok(_) => {}
            Err(StoreError::Conflict { actual, .. }) => {
                return Err(TicketingError::SeatUnavailable {
                    seat: key,
                    status: actual.public(),
                });
            }
            Err(other) => return Err(other.into()),
        }

        tracing::info!(ticket_id = %ticket_id, buyer = %buyer, expires_at = %expires_at, "Resale listing reserved");
        metrics::record_hold_created();
        Ok(Hold {
            holder: buyer.clone(),
            seats: vec![key],
            expires_at,
        })
    }

    /// Open a provider checkout for a reserved listing.
    ///
    /// The buyer keeps the reservation when the provider fails.
    ///
    /// # Errors
    ///
    /// - `AttendeeMismatch`: Invalid attendee
    /// - `TicketNotFound`
    /// - `NotHolder`: The buyer has no live reservation on the listing
    /// - `CheckoutCreateFailed`
    pub async fn start_resale_checkout(
        &self,
        buyer: &ShopperId,
        ticket_id: TicketId,
        attendee: Attendee,
    ) -> TicketingResult<CheckoutStarted> {
        validate_attendees(1, std::slice::from_ref(&attendee))?;
        let ticket = self.env.tickets.get_ticket(ticket_id).await?;
        let key = ticket.seat_key();
        let now = self.env.clock.now();

        let seat = self.env.inventory.get_seat(&key).await?;
        let listing = match &seat.listing {
            Some(listing)
                if seat.status == SeatStatus::ReservedForResale
                    && seat.is_held_by(buyer)
                    && !seat.hold_expired(now)
                    && listing.ticket_id == ticket_id =>
            {
                listing.clone()
            }
            _ => return Err(TicketingError::NotHolder { seat: key }),
        };

        let lines = vec![CheckoutLine {
            seat_no: key.seat_no,
            category: seat.category,
            price: listing.price,
        }];
        let (product_name, unit_amount, quantity) = line_item(&ticket.event_name, &lines, listing.price);
        let settings = self.checkout.settings();
        let request = CheckoutRequest {
            mode: "payment".to_string(),
            success_url: settings.success_url(),
            cancel_url: settings.cancel_url(&key.showtime()),
            currency: settings.currency.clone(),
            product_name,
            unit_amount,
            quantity,
        };

        let created = self.checkout.create_provider_session(&request).await.map_err(|error| {
            tracing::warn!(ticket_id = %ticket_id, buyer = %buyer, error = %error, "Provider resale checkout failed");
            metrics::record_checkout_failed("provider");
            TicketingError::CheckoutCreateFailed(error)
        })?;

        self.env
            .checkouts
            .create_session(CheckoutSession {
                session_id: created.session_id.clone(),
                holder: buyer.clone(),
                event_id: ticket.event_id.clone(),
                event_datetime: ticket.event_datetime,
                event_name: ticket.event_name.clone(),
                lines,
                attendees: vec![attendee],
                amount: listing.price,
                currency: request.currency.clone(),
                success_url: request.success_url,
                cancel_url: request.cancel_url,
                checkout_url: created.checkout_url.clone(),
                kind: CheckoutKind::Resale {
                    ticket_id,
                    seller: listing.seller.clone(),
                },
                status: CheckoutStatus::Pending,
                payment_id: None,
                created_at: now,
            })
            .await?;

        tracing::info!(
            ticket_id = %ticket_id,
            buyer = %buyer,
            session_id = %created.session_id,
            amount = %listing.price,
            "Resale checkout started"
        );
        metrics::record_checkout_started(1);

        Ok(CheckoutStarted {
            session_id: created.session_id,
            checkout_url: created.checkout_url,
            amount: listing.price,
            currency: request.currency,
        })
    }

    /// Confirm payment for a resale session and transfer the ticket.
    ///
    /// Idempotent like [`CheckoutOrchestrator::verify_and_finalize`].
    ///
    /// # Errors
    ///
    /// - `SessionNotFound`
    /// - `PaymentNotConfirmed`
    /// - `Conflict`: Paid, but the listing is gone or another session already
    ///   bought it; the session is marked failed
    pub async fn finalize_resale_purchase(&self, session_id: &SessionId) -> TicketingResult<Ticket> {
        let session = self.env.checkouts.get_session(session_id).await?;
        let CheckoutKind::Resale { ticket_id, seller } = session.kind.clone() else {
            return Err(TicketingError::Conflict(format!(
                "session {session_id} is not a resale checkout"
            )));
        };
        match session.status {
            CheckoutStatus::Verified => {
                let issued = self.env.checkouts.tickets_for_session(session_id).await?;
                return match issued.into_iter().next() {
                    Some(ticket) => Ok(ticket),
                    None => Ok(self.env.tickets.get_ticket(ticket_id).await?),
                };
            }
            CheckoutStatus::Failed => {
                return Err(TicketingError::PaymentNotConfirmed {
                    session_id: session_id.clone(),
                });
            }
            CheckoutStatus::Pending => {}
        }

        let payment_id = self.checkout.confirmed_payment(session_id).await?;
        let Some(key) = session.seat_keys().into_iter().next() else {
            return Err(TicketingError::Conflict(format!("session {session_id} has no seat")));
        };

        if let Err(error) = self.transfer_seat(&key, ticket_id, &session.holder, &seller).await {
            self.abandon(&session, &payment_id, &error).await;
            return Err(error);
        }

        let ticket = match self
            .env
            .checkouts
            .record_resale(session_id, payment_id.clone(), ticket_id, session.holder.clone())
            .await
        {
            Ok(ticket) => ticket,
            Err(StoreError::TicketConflict { actual, .. }) => {
                let error = TicketingError::Conflict(format!(
                    "ticket {ticket_id} is {actual}, already transferred by another checkout"
                ));
                self.abandon(&session, &payment_id, &error).await;
                return Err(error);
            }
            Err(other) => return Err(other.into()),
        };

        tracing::info!(
            ticket_id = %ticket_id,
            seller = %seller,
            buyer = %session.holder,
            payment_id = %payment_id,
            "Resale purchase finalized"
        );
        metrics::record_tickets_sold("resale", 1, session.amount.cents());

        let settlement = SettlementRecord {
            seller: seller.clone(),
            ticket_id,
            payment_id,
            amount: session.amount,
        };
        if let Err(error) = self.env.ledger.credit_seller(settlement).await {
            tracing::warn!(seller = %seller, ticket_id = %ticket_id, error = %error, "Seller settlement failed");
            metrics::record_collaborator_failure("ledger");
        }
        Ok(ticket)
    }

    async fn transfer_seat(
        &self,
        key: &SeatKey,
        ticket_id: TicketId,
        buyer: &ShopperId,
        seller: &ShopperId,
    ) -> TicketingResult<()> {
        let now = self.env.clock.now();
        let sell = SeatTransition::new(key.clone(), SeatStatus::ReservedForResale, SeatStatus::Sold)
            .guarded_by(buyer.clone())
            .own(buyer.clone())
            .delist();
        match self.env.inventory.transition(sell, now).await {
            Ok(_) => return Ok(()),
            Err(StoreError::Conflict { .. }) => {}
            Err(other) => return Err(other.into()),
        }

        let seat = self.env.inventory.get_seat(key).await?;
        match seat.status {
            SeatStatus::Sold if seat.is_held_by(buyer) => Ok(()),
            // Reservation lapsed while the buyer was paying.
            SeatStatus::ResaleListed if listing_matches(&seat, ticket_id) => {
                let sell = SeatTransition::new(key.clone(), SeatStatus::ResaleListed, SeatStatus::Sold)
                    .guarded_by(seller.clone())
                    .own(buyer.clone())
                    .delist();
                self.env.inventory.transition(sell, now).await.map(|_| ()).map_err(|error| match error {
                    StoreError::Conflict { actual, .. } => {
                        TicketingError::Conflict(format!("seat {key} is {actual}, cannot transfer"))
                    }
                    other => other.into(),
                })
            }
            actual => Err(TicketingError::Conflict(format!(
                "seat {key} is {actual}, cannot transfer"
            ))),
        }
    }

    async fn abandon(&self, session: &CheckoutSession, payment_id: &PaymentId, cause: &TicketingError) {
        if let Err(error) = self
            .env
            .checkouts
            .mark_failed(&session.session_id, Some(payment_id.clone()))
            .await
        {
            tracing::warn!(session_id = %session.session_id, error = %error, "Could not mark session failed");
        }
        tracing::error!(
            session_id = %session.session_id,
            payment_id = %payment_id,
            buyer = %session.holder,
            amount = %session.amount,
            error = %cause,
            "Paid resale could not be fulfilled, refund required"
        );
        metrics::record_reconciliation_conflict();
    }
}

fn listing_matches(seat: &Seat, ticket_id: TicketId) -> bool {
    seat.listing.as_ref().is_some_and(|listing| listing.ticket_id == ticket_id)
}

fn ticket_conflict(ticket_id: TicketId, error: StoreError) -> TicketingError {
    match error {
        StoreError::TicketConflict {
            actual: TicketStatus::CheckedIn,
            ..
        } => TicketingError::AlreadyCheckedIn(ticket_id),
        StoreError::TicketConflict {
            actual: TicketStatus::ResaleListed,
            ..
        } => TicketingError::AlreadyListed(ticket_id),
        other => other.into(),
    }
}
