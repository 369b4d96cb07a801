//! HTTP API handlers, organized by resource:
//!
//! - **seats**: seat map, select/deselect, current selection
//! - **checkout**: primary checkout and payment verification
//! - **tickets**: owned tickets and check-in
//! - **resale**: listings, resale reservation and checkout
//!
//! Bodies are camelCase JSON. Money crosses the boundary as decimal major
//! units (`50.0`); internally it is always cents.

pub mod checkout;
pub mod resale;
pub mod seats;
pub mod tickets;

use crate::app::CheckoutStarted;
use boxoffice_core::types::{
    CheckoutKind, CheckoutSession, EventId, SeatCategory, Showtime, Ticket, TicketId, TicketStatus,
};
use boxoffice_web::AppError;
use chrono::{DateTime, Utc};
use serde::Serialize;

/// `{code, data}` envelope used by the storefront's list endpoints.
#[derive(Debug, Serialize)]
pub struct Envelope<T> {
    /// HTTP status mirrored in the body
    pub code: u16,
    /// Payload
    pub data: T,
}

impl<T> Envelope<T> {
    /// A `200` envelope around `data`.
    pub const fn ok(data: T) -> Self {
        Self { code: 200, data }
    }
}

/// Parse the `{eventID}/{eventDateTime}` path pair.
pub(crate) fn parse_showtime(event_id: &str, event_datetime: &str) -> Result<Showtime, AppError> {
    let event_id: EventId = event_id
        .parse()
        .map_err(|_| AppError::bad_request("Event id must not be empty"))?;
    let event_datetime = DateTime::parse_from_rfc3339(event_datetime)
        .map_err(|e| AppError::bad_request(format!("Invalid event date time {event_datetime:?}: {e}")))?
        .with_timezone(&Utc);
    Ok(Showtime::new(event_id, event_datetime))
}

pub(crate) fn parse_ticket_id(raw: &str) -> Result<TicketId, AppError> {
    raw.parse()
        .map_err(|_| AppError::bad_request(format!("Invalid ticket id {raw:?}")))
}

/// A ticket as returned to its owner.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TicketView {
    /// Ticket id
    pub ticket_id: TicketId,
    /// Current owner
    pub owner_id: String,
    /// Event
    pub event_id: String,
    /// Event name
    pub event_name: String,
    /// Showtime
    pub event_date_time: DateTime<Utc>,
    /// Seat
    pub seat_no: u32,
    /// Seat category
    pub seat_category: SeatCategory,
    /// Price paid
    pub price: f64,
    /// Asking price while listed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resale_price: Option<f64>,
    /// Payment that produced the current ownership
    #[serde(rename = "paymentID")]
    pub payment_id: String,
    /// Whether the ticket has been scanned
    pub is_checked_in: bool,
    /// Lifecycle status
    pub status: TicketStatus,
}

impl From<Ticket> for TicketView {
    fn from(ticket: Ticket) -> Self {
        Self {
            ticket_id: ticket.ticket_id,
            owner_id: ticket.owner_id.to_string(),
            event_id: ticket.event_id.to_string(),
            event_name: ticket.event_name,
            event_date_time: ticket.event_datetime,
            seat_no: ticket.seat_no.value(),
            seat_category: ticket.seat_category,
            price: ticket.price.as_decimal(),
            resale_price: ticket.resale_price.map(|price| price.as_decimal()),
            payment_id: ticket.payment_id.to_string(),
            is_checked_in: ticket.is_checked_in,
            status: ticket.status,
        }
    }
}

/// Redirect target for a created checkout.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutView {
    /// Provider session id
    pub session_id: String,
    /// Hosted payment page
    pub checkout_url: String,
    /// Total in major units
    pub amount: f64,
    /// Currency
    pub currency: String,
}

impl From<CheckoutStarted> for CheckoutView {
    fn from(started: CheckoutStarted) -> Self {
        Self {
            session_id: started.session_id.to_string(),
            checkout_url: started.checkout_url,
            amount: started.amount.as_decimal(),
            currency: started.currency,
        }
    }
}

pub(crate) fn is_resale(session: &CheckoutSession) -> bool {
    matches!(session.kind, CheckoutKind::Resale { .. })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_showtime_accepts_offsets() {
        let showtime = parse_showtime("evt-1", "2025-03-01T20:00:00+08:00").unwrap();
        assert_eq!(showtime.event_datetime.to_rfc3339(), "2025-03-01T12:00:00+00:00");
    }

    #[test]
    fn test_parse_showtime_rejects_garbage() {
        assert!(parse_showtime("evt-1", "tomorrow").is_err());
        assert!(parse_showtime(" ", "2025-03-01T20:00:00Z").is_err());
    }
}
