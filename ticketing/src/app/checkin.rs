//! Ticket reads and venue check-in.

use super::TicketingEnvironment;
use crate::error::{TicketingError, TicketingResult};
use crate::metrics;
use boxoffice_core::store::StoreError;
use boxoffice_core::types::{ShopperId, Ticket, TicketId, TicketStatus};
use serde::Serialize;
use std::sync::Arc;

/// Check-in state of a ticket, for polling by the ticket page.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckInStatus {
    /// Ticket
    pub ticket_id: TicketId,
    /// Whether the ticket has been scanned
    pub is_checked_in: bool,
    /// Lifecycle status
    pub status: TicketStatus,
}

impl From<&Ticket> for CheckInStatus {
    fn from(ticket: &Ticket) -> Self {
        Self {
            ticket_id: ticket.ticket_id,
            is_checked_in: ticket.is_checked_in,
            status: ticket.status,
        }
    }
}

/// Check-in service.
#[derive(Clone)]
pub struct CheckInService {
    env: Arc<TicketingEnvironment>,
}

impl CheckInService {
    /// Creates a new `CheckInService`
    #[must_use]
    pub const fn new(env: Arc<TicketingEnvironment>) -> Self {
        Self { env }
    }

    /// Scan a ticket at the venue.
    ///
    /// # Errors
    ///
    /// - `TicketNotFound`
    /// - `AlreadyCheckedIn`: Scanned before
    /// - `AlreadyListed`: Ticket is on resale and cannot be used
    pub async fn check_in(&self, ticket_id: TicketId) -> TicketingResult<Ticket> {
        let ticket = self
            .env
            .tickets
            .transition_ticket(ticket_id, TicketStatus::Confirmed, TicketStatus::CheckedIn, None)
            .await
            .map_err(|error| match error {
                StoreError::TicketConflict {
                    actual: TicketStatus::CheckedIn,
                    ..
                } => TicketingError::AlreadyCheckedIn(ticket_id),
                StoreError::TicketConflict {
                    actual: TicketStatus::ResaleListed,
                    ..
                } => TicketingError::AlreadyListed(ticket_id),
                other => other.into(),
            })?;

        tracing::info!(ticket_id = %ticket_id, owner = %ticket.owner_id, "Ticket checked in");
        metrics::record_check_in();
        Ok(ticket)
    }

    /// Current check-in state.
    ///
    /// # Errors
    ///
    /// `TicketNotFound` or `StoreUnavailable`.
    pub async fn status(&self, ticket_id: TicketId) -> TicketingResult<CheckInStatus> {
        let ticket = self.env.tickets.get_ticket(ticket_id).await?;
        Ok(CheckInStatus::from(&ticket))
    }

    /// Tickets owned by `owner`.
    ///
    /// # Errors
    ///
    /// `StoreUnavailable`.
    pub async fn tickets_for_owner(&self, owner: &ShopperId) -> TicketingResult<Vec<Ticket>> {
        Ok(self.env.tickets.tickets_for_owner(owner).await?)
    }
}
