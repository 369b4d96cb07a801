//! Checkout orchestration: provider handoff and payment reconciliation.
//!
//! # Flow
//!
//! 1. [`CheckoutOrchestrator::start_checkout`] locks the shopper's held seats
//!    (`held → reserved`), asks the provider for a hosted session and records
//!    it as `pending`.
//! 2. The shopper pays on the provider page and is redirected back with the
//!    session id.
//! 3. [`CheckoutOrchestrator::verify_and_finalize`] asks the provider whether
//!    the session was paid, commits the seats (`reserved → sold`) and issues
//!    tickets. The session id is the idempotency key: repeated calls return
//!    the tickets issued by the first.
//!
//! Multi-seat steps are applied seat by seat; a failure part way unwinds the
//! seats already moved.

use super::TicketingEnvironment;
use crate::config::PaymentConfig;
use crate::error::{TicketingError, TicketingResult};
use crate::metrics;
use crate::retry::RetryPolicy;
use crate::validation::validate_attendees;
use boxoffice_core::collaborators::PurchaseRecord;
use boxoffice_core::payment::{CheckoutRequest, PaymentError, ProviderSession, SESSION_ID_PLACEHOLDER};
use boxoffice_core::store::{SeatTransition, StoreError};
use boxoffice_core::types::{
    Attendee, CheckoutKind, CheckoutLine, CheckoutSession, CheckoutStatus, Money, PaymentId,
    SeatCategory, SeatKey, SeatNo, SeatStatus, SessionId, ShopperId, Showtime, Ticket, TicketId,
    TicketStatus,
};
use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;
use std::collections::BTreeSet;
use std::sync::Arc;

/// Provider and storefront settings shared by primary and resale checkout.
#[derive(Clone, Debug)]
pub struct CheckoutSettings {
    /// Lowercase ISO currency
    pub currency: String,
    /// Base URL of the storefront, for provider redirects
    pub storefront_url: String,
    /// Timeout and retry for provider calls
    pub retry: RetryPolicy,
}

impl CheckoutSettings {
    /// Settings from the payment configuration section.
    #[must_use]
    pub fn from_config(config: &PaymentConfig) -> Self {
        Self {
            currency: config.currency.to_lowercase(),
            storefront_url: config.storefront_url.trim_end_matches('/').to_string(),
            retry: RetryPolicy::new(config.request_timeout(), config.retries),
        }
    }

    pub(crate) fn success_url(&self) -> String {
        format!(
            "{}/checkout/success?session_id={SESSION_ID_PLACEHOLDER}",
            self.storefront_url
        )
    }

    pub(crate) fn cancel_url(&self, showtime: &Showtime) -> String {
        format!(
            "{}/seats/{}/{}",
            self.storefront_url,
            showtime.event_id,
            showtime.event_datetime.to_rfc3339_opts(SecondsFormat::Secs, true)
        )
    }
}

impl Default for CheckoutSettings {
    fn default() -> Self {
        Self::from_config(&PaymentConfig::default())
    }
}

/// A checkout request from the storefront.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StartCheckout {
    /// Showtime the seats belong to
    pub showtime: Showtime,
    /// Event display name, used for the provider line item
    pub event_name: String,
    /// Seats to buy
    pub seats: Vec<SeatNo>,
    /// One attendee per seat, same order as `seats`
    pub attendees: Vec<Attendee>,
}

/// A created checkout, ready for the provider redirect.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutStarted {
    /// Provider session id
    pub session_id: SessionId,
    /// Hosted payment page
    pub checkout_url: String,
    /// Total to be charged
    pub amount: Money,
    /// Currency of `amount`
    pub currency: String,
}

/// Provider line item for a set of priced seats.
///
/// Uniformly priced seats go out as `price × count`; mixed prices as a single
/// unit carrying the total.
pub(crate) fn line_item(
    event_name: &str,
    lines: &[CheckoutLine],
    total: Money,
) -> (String, Money, u32) {
    let categories: BTreeSet<SeatCategory> = lines.iter().map(|line| line.category).collect();
    let categories = categories
        .iter()
        .map(SeatCategory::as_str)
        .collect::<Vec<_>>()
        .join(", ");
    let product_name = format!("{event_name} - Category {categories}");

    let uniform = lines.windows(2).all(|pair| pair[0].price == pair[1].price);
    match (lines.first(), u32::try_from(lines.len())) {
        (Some(first), Ok(quantity)) if uniform => (product_name, first.price, quantity),
        _ => (product_name, total, 1),
    }
}

/// Checkout orchestrator.
#[derive(Clone)]
pub struct CheckoutOrchestrator {
    env: Arc<TicketingEnvironment>,
    settings: CheckoutSettings,
}

impl CheckoutOrchestrator {
    /// Creates a new `CheckoutOrchestrator`
    #[must_use]
    pub const fn new(env: Arc<TicketingEnvironment>, settings: CheckoutSettings) -> Self {
        Self { env, settings }
    }

    /// Reserve the shopper's held seats and open a provider checkout session.
    ///
    /// # Errors
    ///
    /// - `AttendeeMismatch`: No seats, attendee count differs, or an attendee is invalid
    /// - `NotHolder`: A seat is not (or no longer) held by the shopper
    /// - `Conflict`: A seat changed while being reserved; nothing stays reserved
    /// - `CheckoutCreateFailed`: Provider failed; the seats are back to held
    /// - `StoreUnavailable`
    pub async fn start_checkout(
        &self,
        shopper: &ShopperId,
        request: StartCheckout,
    ) -> TicketingResult<CheckoutStarted> {
        validate_attendees(request.seats.len(), &request.attendees)?;
        let distinct: BTreeSet<SeatNo> = request.seats.iter().copied().collect();
        if distinct.len() != request.seats.len() {
            return Err(TicketingError::AttendeeMismatch(
                "a seat is listed more than once".to_string(),
            ));
        }

        let now = self.env.clock.now();
        let keys: Vec<SeatKey> = request
            .seats
            .iter()
            .map(|seat_no| request.showtime.seat(*seat_no))
            .collect();

        let mut lines = Vec::with_capacity(keys.len());
        for key in &keys {
            let seat = self.env.inventory.get_seat(key).await?;
            if seat.status != SeatStatus::Held || !seat.is_held_by(shopper) || seat.hold_expired(now) {
                return Err(TicketingError::NotHolder { seat: key.clone() });
            }
            lines.push(CheckoutLine {
                seat_no: key.seat_no,
                category: seat.category,
                price: seat.price,
            });
        }
        let total = Money::checked_sum(lines.iter().map(|line| line.price))
            .ok_or_else(|| TicketingError::Conflict("order total overflows".to_string()))?;

        self.reserve_all(shopper, &keys, now).await?;

        let (product_name, unit_amount, quantity) = line_item(&request.event_name, &lines, total);
        let provider_request = CheckoutRequest {
            mode: "payment".to_string(),
            success_url: self.settings.success_url(),
            cancel_url: self.settings.cancel_url(&request.showtime),
            currency: self.settings.currency.clone(),
            product_name,
            unit_amount,
            quantity,
        };

        let created = match self.create_provider_session(&provider_request).await {
            Ok(created) => created,
            Err(error) => {
                tracing::warn!(
                    shopper = %shopper,
                    showtime = %request.showtime,
                    error = %error,
                    "Provider checkout failed, releasing reservation back to hold"
                );
                self.unreserve(shopper, &keys).await;
                metrics::record_checkout_failed("provider");
                return Err(TicketingError::CheckoutCreateFailed(error));
            }
        };

        let session = CheckoutSession {
            session_id: created.session_id.clone(),
            holder: shopper.clone(),
            event_id: request.showtime.event_id.clone(),
            event_datetime: request.showtime.event_datetime,
            event_name: request.event_name,
            lines,
            attendees: request.attendees,
            amount: total,
            currency: provider_request.currency.clone(),
            success_url: provider_request.success_url,
            cancel_url: provider_request.cancel_url,
            checkout_url: created.checkout_url.clone(),
            kind: CheckoutKind::Primary,
            status: CheckoutStatus::Pending,
            payment_id: None,
            created_at: now,
        };
        if let Err(error) = self.env.checkouts.create_session(session).await {
            self.unreserve(shopper, &keys).await;
            metrics::record_checkout_failed("store");
            return Err(error.into());
        }

        tracing::info!(
            shopper = %shopper,
            session_id = %created.session_id,
            seats = keys.len(),
            amount = %total,
            "Checkout started"
        );
        metrics::record_checkout_started(keys.len());

        Ok(CheckoutStarted {
            session_id: created.session_id,
            checkout_url: created.checkout_url,
            amount: total,
            currency: provider_request.currency,
        })
    }

    /// Confirm payment for a session and issue its tickets.
    ///
    /// Safe to call any number of times: a verified session returns the
    /// tickets it already issued without contacting the provider.
    ///
    /// Only primary sessions are finalized here. Resale sessions go through
    /// [`ResaleManager::finalize_resale_purchase`](super::ResaleManager::finalize_resale_purchase);
    /// callers holding just a session id dispatch on [`CheckoutSession::kind`].
    ///
    /// # Errors
    ///
    /// - `SessionNotFound`: Unknown session
    /// - `PaymentNotConfirmed`: Provider reports no payment, cannot be reached,
    ///   or the session already failed
    /// - `Conflict`: Paid, but a seat was lost or already ticketed by another
    ///   session; the session is marked failed. Also returned for a pending
    ///   resale session.
    /// - `StoreUnavailable`
    pub async fn verify_and_finalize(&self, session_id: &SessionId) -> TicketingResult<Vec<Ticket>> {
        let session = self.env.checkouts.get_session(session_id).await?;
        match session.status {
            CheckoutStatus::Verified => {
                tracing::debug!(session_id = %session_id, "Session already verified");
                return Ok(self.env.checkouts.tickets_for_session(session_id).await?);
            }
            CheckoutStatus::Failed => {
                return Err(TicketingError::PaymentNotConfirmed {
                    session_id: session_id.clone(),
                });
            }
            CheckoutStatus::Pending => {}
        }
        if matches!(session.kind, CheckoutKind::Resale { .. }) {
            return Err(TicketingError::Conflict(format!(
                "session {session_id} is a resale checkout"
            )));
        }

        let payment_id = self.confirmed_payment(session_id).await?;
        let now = self.env.clock.now();

        let mut sold: Vec<SeatKey> = Vec::with_capacity(session.lines.len());
        for key in session.seat_keys() {
            match self.commit_seat(&session.holder, &key, now).await {
                Ok(true) => sold.push(key),
                Ok(false) => {}
                Err(error) => {
                    self.abandon(&session, &payment_id, &sold, &error).await;
                    return Err(error);
                }
            }
        }

        let tickets: Vec<Ticket> = session
            .lines
            .iter()
            .map(|line| Ticket {
                ticket_id: TicketId::new(),
                owner_id: session.holder.clone(),
                event_id: session.event_id.clone(),
                event_name: session.event_name.clone(),
                event_datetime: session.event_datetime,
                seat_no: line.seat_no,
                seat_category: line.category,
                price: line.price,
                resale_price: None,
                payment_id: payment_id.clone(),
                session_id: session_id.clone(),
                is_checked_in: false,
                status: TicketStatus::Confirmed,
                purchased_at: now,
            })
            .collect();
        let issued = tickets.first().map(|ticket| ticket.ticket_id);

        let stored = match self
            .env
            .checkouts
            .record_purchase(session_id, payment_id.clone(), tickets)
            .await
        {
            Ok(stored) => stored,
            Err(StoreError::AlreadyTicketed { seats }) => {
                // Those seats belong to the other session's tickets, leave them sold
                let ours: Vec<SeatKey> = sold.into_iter().filter(|key| !seats.contains(key)).collect();
                let error = TicketingError::Conflict(format!(
                    "session {session_id}: {} seat(s) already sold by another checkout",
                    seats.len()
                ));
                self.abandon(&session, &payment_id, &ours, &error).await;
                return Err(error);
            }
            Err(other) => return Err(other.into()),
        };
        if stored.is_empty() {
            return Err(TicketingError::Conflict(format!(
                "session {session_id} was closed while finalizing"
            )));
        }
        if stored.first().map(|ticket| ticket.ticket_id) != issued {
            tracing::debug!(session_id = %session_id, "Concurrent finalize won, returning its tickets");
            return Ok(stored);
        }

        tracing::info!(
            shopper = %session.holder,
            session_id = %session_id,
            payment_id = %payment_id,
            tickets = stored.len(),
            "Purchase finalized"
        );
        metrics::record_tickets_sold("primary", stored.len(), session.amount.cents());
        self.publish(&session.holder, &stored).await;
        Ok(stored)
    }

    /// A checkout session by provider id.
    ///
    /// # Errors
    ///
    /// `SessionNotFound` or `StoreUnavailable`.
    pub async fn session(&self, session_id: &SessionId) -> TicketingResult<CheckoutSession> {
        Ok(self.env.checkouts.get_session(session_id).await?)
    }

    pub(crate) async fn create_provider_session(
        &self,
        request: &CheckoutRequest,
    ) -> Result<ProviderSession, PaymentError> {
        self.settings
            .retry
            .run("create_checkout", || self.env.payments.create_checkout(request.clone()))
            .await
    }

    pub(crate) async fn confirmed_payment(&self, session_id: &SessionId) -> TicketingResult<PaymentId> {
        let verified = self
            .settings
            .retry
            .run("verify_payment", || self.env.payments.verify_payment(session_id))
            .await;
        match verified {
            Ok(Some(payment_id)) => Ok(payment_id),
            Ok(None) => {
                tracing::info!(session_id = %session_id, "Payment not confirmed yet");
                metrics::record_payment_unconfirmed();
                Err(TicketingError::PaymentNotConfirmed {
                    session_id: session_id.clone(),
                })
            }
            Err(error) => {
                tracing::warn!(session_id = %session_id, error = %error, "Payment verification failed");
                metrics::record_payment_unconfirmed();
                Err(TicketingError::PaymentNotConfirmed {
                    session_id: session_id.clone(),
                })
            }
        }
    }

    pub(crate) const fn settings(&self) -> &CheckoutSettings {
        &self.settings
    }

    async fn reserve_all(&self, shopper: &ShopperId, keys: &[SeatKey], now: DateTime<Utc>) -> TicketingResult<()> {
        for (index, key) in keys.iter().enumerate() {
            let reserve = SeatTransition::new(key.clone(), SeatStatus::Held, SeatStatus::Reserved)
                .guarded_by(shopper.clone());
            match self.env.inventory.transition(reserve, now).await {
                Ok(_) => {}
                Err(error) => {
                    self.unreserve(shopper, &keys[..index]).await;
                    metrics::record_checkout_failed("conflict");
                    return Err(match error {
                        StoreError::Conflict { seat, actual, .. } => TicketingError::Conflict(format!(
                            "seat {seat} changed to {actual} during checkout"
                        )),
                        other => other.into(),
                    });
                }
            }
        }
        Ok(())
    }

    async fn unreserve(&self, shopper: &ShopperId, keys: &[SeatKey]) {
        let now = self.env.clock.now();
        for key in keys {
            let rollback = SeatTransition::new(key.clone(), SeatStatus::Reserved, SeatStatus::Held)
                .guarded_by(shopper.clone());
            if let Err(error) = self.env.inventory.transition(rollback, now).await {
                tracing::warn!(seat = %key, error = %error, "Could not return reserved seat to hold");
            } else {
                tracing::warn!(seat = %key, shopper = %shopper, "Reserved seat returned to hold");
            }
        }
    }

    /// Move one seat to sold for `holder`.
    ///
    /// Returns `false` when the seat was already sold to `holder`. That sale
    /// may belong to another session of the same shopper; `record_purchase`
    /// refuses to ticket the seat twice.
    async fn commit_seat(&self, holder: &ShopperId, key: &SeatKey, now: DateTime<Utc>) -> TicketingResult<bool> {
        let commit = SeatTransition::new(key.clone(), SeatStatus::Reserved, SeatStatus::Sold)
            .guarded_by(holder.clone())
            .own(holder.clone());
        match self.env.inventory.transition(commit, now).await {
            Ok(_) => return Ok(true),
            Err(StoreError::Conflict { .. }) => {}
            Err(other) => return Err(other.into()),
        }

        let seat = self.env.inventory.get_seat(key).await?;
        let fallback = match seat.status {
            SeatStatus::Sold if seat.is_held_by(holder) => return Ok(false),
            // Hold lapsed before payment came back, nobody took the seat.
            SeatStatus::Available => SeatTransition::new(key.clone(), SeatStatus::Available, SeatStatus::Sold),
            SeatStatus::Held if seat.is_held_by(holder) => {
                SeatTransition::new(key.clone(), SeatStatus::Held, SeatStatus::Sold).guarded_by(holder.clone())
            }
            actual => {
                return Err(TicketingError::Conflict(format!(
                    "seat {key} is {actual} and cannot be sold"
                )));
            }
        };
        match self.env.inventory.transition(fallback.own(holder.clone()), now).await {
            Ok(_) => Ok(true),
            Err(StoreError::Conflict { actual, .. }) => Err(TicketingError::Conflict(format!(
                "seat {key} is {actual} and cannot be sold"
            ))),
            Err(other) => Err(other.into()),
        }
    }

    /// Give up on a paid session: undo the seats sold so far and mark it failed.
    async fn abandon(
        &self,
        session: &CheckoutSession,
        payment_id: &PaymentId,
        sold: &[SeatKey],
        cause: &TicketingError,
    ) {
        let now = self.env.clock.now();
        for key in sold {
            let undo = SeatTransition::new(key.clone(), SeatStatus::Sold, SeatStatus::Available)
                .guarded_by(session.holder.clone())
                .release();
            if let Err(error) = self.env.inventory.transition(undo, now).await {
                tracing::warn!(seat = %key, error = %error, "Could not release seat after failed finalize");
            }
        }
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
            shopper = %session.holder,
            amount = %session.amount,
            error = %cause,
            "Paid session could not be fulfilled, refund required"
        );
        metrics::record_reconciliation_conflict();
    }

    async fn publish(&self, user: &ShopperId, tickets: &[Ticket]) {
        let record = PurchaseRecord {
            user_id: user.clone(),
            tickets: tickets.to_vec(),
        };
        if let Err(error) = self.env.publisher.publish_purchase(record).await {
            tracing::warn!(user = %user, error = %error, "Ticket service notification failed");
            metrics::record_collaborator_failure("ticket_service");
        }
    }
}
