//! Ticket endpoints.
//!
//! - `GET /tickets/:owner_id` - Tickets owned by the caller
//! - `GET /ticket/:ticket_id/checkin` - Check-in status (polled by the ticket page)
//! - `POST /ticket/:ticket_id/checkin` - Scan a ticket at the venue

use super::{TicketView, parse_ticket_id};
use crate::app::CheckInStatus;
use crate::server::state::AppState;
use axum::{
    Json,
    extract::{Path, State},
};
use boxoffice_core::types::ShopperId;
use boxoffice_web::{AppError, Shopper, WebResult};

/// Tickets owned by `owner_id`. Callers may only read their own.
pub async fn tickets_for_owner(
    Shopper(shopper): Shopper,
    State(state): State<AppState>,
    Path(owner_id): Path<String>,
) -> WebResult<Json<Vec<TicketView>>> {
    let owner: ShopperId = owner_id
        .parse()
        .map_err(|_| AppError::bad_request("Owner id must not be empty"))?;
    if owner != shopper {
        return Err(AppError::forbidden("Tickets of another shopper").with_code("NOT_OWNER"));
    }
    let tickets = state.ticketing.checkin.tickets_for_owner(&owner).await?;
    Ok(Json(tickets.into_iter().map(TicketView::from).collect()))
}

/// Check-in status of a ticket.
pub async fn checkin_status(
    State(state): State<AppState>,
    Path(ticket_id): Path<String>,
) -> WebResult<Json<CheckInStatus>> {
    let ticket_id = parse_ticket_id(&ticket_id)?;
    Ok(Json(state.ticketing.checkin.status(ticket_id).await?))
}

/// Check a ticket in.
pub async fn check_in(
    State(state): State<AppState>,
    Path(ticket_id): Path<String>,
) -> WebResult<Json<TicketView>> {
    let ticket_id = parse_ticket_id(&ticket_id)?;
    let ticket = state.ticketing.checkin.check_in(ticket_id).await?;
    Ok(Json(ticket.into()))
}
