//! Resale endpoints.
//!
//! - `POST /sellticket/:ticket_id` - List an owned ticket (`{"resalePrice": 30.0}`)
//! - `DELETE /sellticket/:ticket_id` - Withdraw a listing
//! - `POST /resale/:ticket_id/reserve` - Reserve a listing for checkout
//! - `POST /resale/:ticket_id/checkout` - Open a provider checkout for it

use super::{CheckoutView, TicketView, parse_ticket_id};
use crate::server::state::AppState;
use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use boxoffice_core::types::{Attendee, Hold};
use boxoffice_web::{Shopper, WebResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Body of `POST /sellticket/:ticket_id`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListRequest {
    /// Asking price in major units
    pub resale_price: f64,
}

/// Body of `POST /resale/:ticket_id/checkout`.
#[derive(Debug, Deserialize)]
pub struct ResaleCheckoutRequest {
    /// Attendee for the seat
    pub attendee: Attendee,
}

/// A buyer's reservation on a listing.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HoldView {
    /// Buyer
    pub holder: String,
    /// Reserved seats
    pub seats: Vec<u32>,
    /// When the reservation lapses
    pub expires_at: DateTime<Utc>,
}

impl From<Hold> for HoldView {
    fn from(hold: Hold) -> Self {
        Self {
            holder: hold.holder.to_string(),
            seats: hold.seats.iter().map(|key| key.seat_no.value()).collect(),
            expires_at: hold.expires_at,
        }
    }
}

/// List a ticket for resale.
pub async fn list_for_resale(
    Shopper(owner): Shopper,
    State(state): State<AppState>,
    Path(ticket_id): Path<String>,
    Json(request): Json<ListRequest>,
) -> WebResult<Json<TicketView>> {
    let ticket_id = parse_ticket_id(&ticket_id)?;
    let ticket = state
        .ticketing
        .resale
        .list_for_resale(&owner, ticket_id, request.resale_price)
        .await?;
    Ok(Json(ticket.into()))
}

/// Withdraw a resale listing.
pub async fn withdraw_listing(
    Shopper(owner): Shopper,
    State(state): State<AppState>,
    Path(ticket_id): Path<String>,
) -> WebResult<Json<TicketView>> {
    let ticket_id = parse_ticket_id(&ticket_id)?;
    let ticket = state.ticketing.resale.withdraw_listing(&owner, ticket_id).await?;
    Ok(Json(ticket.into()))
}

/// Reserve a listed ticket.
pub async fn reserve_resale(
    Shopper(buyer): Shopper,
    State(state): State<AppState>,
    Path(ticket_id): Path<String>,
) -> WebResult<Json<HoldView>> {
    let ticket_id = parse_ticket_id(&ticket_id)?;
    let hold = state.ticketing.resale.reserve_resale(&buyer, ticket_id).await?;
    Ok(Json(hold.into()))
}

/// Start checkout for a reserved listing.
pub async fn start_resale_checkout(
    Shopper(buyer): Shopper,
    State(state): State<AppState>,
    Path(ticket_id): Path<String>,
    Json(request): Json<ResaleCheckoutRequest>,
) -> WebResult<(StatusCode, Json<CheckoutView>)> {
    let ticket_id = parse_ticket_id(&ticket_id)?;
    let started = state
        .ticketing
        .resale
        .start_resale_checkout(&buyer, ticket_id, request.attendee)
        .await?;
    Ok((StatusCode::CREATED, Json(started.into())))
}
