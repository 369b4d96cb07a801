//! Checkout endpoints.
//!
//! - `POST /checkout` - Reserve held seats and open a provider checkout
//! - `GET /verify-payment?session_id=` - Reconcile a paid session into tickets
//!
//! The provider redirects the shopper to the storefront's success page, which
//! calls `verify-payment`. The call is idempotent; reloading the success page
//! returns the same tickets.

use super::{CheckoutView, TicketView, is_resale};
use crate::app::StartCheckout;
use crate::server::state::AppState;
use axum::{
    Json,
    extract::{Query, State},
    http::StatusCode,
};
use boxoffice_core::types::{Attendee, EventId, SeatNo, SessionId, Showtime};
use boxoffice_web::{AppError, Shopper, WebResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Body of `POST /checkout`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartCheckoutRequest {
    /// Event
    #[serde(rename = "eventID")]
    pub event_id: EventId,
    /// Showtime
    pub event_date_time: DateTime<Utc>,
    /// Event display name
    pub event_name: String,
    /// Seats to buy
    pub seats: Vec<u32>,
    /// One attendee per seat
    pub attendees: Vec<Attendee>,
}

/// Query of `GET /verify-payment`.
#[derive(Debug, Deserialize)]
pub struct VerifyQuery {
    /// Provider session id
    pub session_id: String,
}

/// Tickets issued for a verified session.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifiedView {
    /// Session
    pub session_id: String,
    /// Issued or transferred tickets
    pub tickets: Vec<TicketView>,
}

/// Start a checkout for the caller's held seats.
///
/// # Example
///
/// ```bash
/// curl -X POST http://localhost:8080/checkout \
///   -H "X-Shopper-Id: user-7" -H "Content-Type: application/json" \
///   -d '{"eventID":"evt-1","eventDateTime":"2025-03-01T12:00:00Z","eventName":"Concert",
///        "seats":[12],"attendees":[{"name":"Ann","email":"ann@example.com","phone":"+6591234567"}]}'
/// ```
pub async fn start_checkout(
    Shopper(shopper): Shopper,
    State(state): State<AppState>,
    Json(request): Json<StartCheckoutRequest>,
) -> WebResult<(StatusCode, Json<CheckoutView>)> {
    let started = state
        .ticketing
        .checkout
        .start_checkout(
            &shopper,
            StartCheckout {
                showtime: Showtime::new(request.event_id, request.event_date_time),
                event_name: request.event_name,
                seats: request.seats.into_iter().map(SeatNo).collect(),
                attendees: request.attendees,
            },
        )
        .await?;
    Ok((StatusCode::CREATED, Json(started.into())))
}

/// Verify payment for a session and return its tickets.
///
/// Dispatches on the session kind: primary sessions issue tickets, resale
/// sessions transfer the listed ticket.
pub async fn verify_payment(
    State(state): State<AppState>,
    Query(query): Query<VerifyQuery>,
) -> WebResult<Json<VerifiedView>> {
    let session_id: SessionId = query
        .session_id
        .parse()
        .map_err(|_| AppError::bad_request("session_id must not be empty"))?;

    let session = state.ticketing.checkout.session(&session_id).await?;
    let tickets = if is_resale(&session) {
        vec![state.ticketing.resale.finalize_resale_purchase(&session_id).await?]
    } else {
        state.ticketing.checkout.verify_and_finalize(&session_id).await?
    };

    Ok(Json(VerifiedView {
        session_id: session_id.to_string(),
        tickets: tickets.into_iter().map(TicketView::from).collect(),
    }))
}
