//! Seat map and selection endpoints.
//!
//! - `GET /seats/:event_id/:event_datetime` - Seat map (public)
//! - `POST /seats/:event_id/:event_datetime/:seat_no/select` - Toggle a seat
//! - `DELETE /seats/:event_id/:event_datetime/:seat_no/select` - Release a seat
//! - `GET /selection/:event_id/:event_datetime` - The shopper's held seats

use super::{Envelope, parse_showtime};
use crate::app::{SelectOutcome, Selection};
use crate::server::state::AppState;
use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use boxoffice_core::types::{Seat, SeatCategory, SeatNo, SeatStatus};
use boxoffice_web::{Shopper, WebResult};
use chrono::{DateTime, Utc};
use serde::Serialize;

/// One seat of the map.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SeatView {
    /// Seat number
    pub seat_no: u32,
    /// Category
    pub category: SeatCategory,
    /// Current asking price in major units
    pub price: f64,
    /// Public status
    pub status: SeatStatus,
}

impl From<&Seat> for SeatView {
    fn from(seat: &Seat) -> Self {
        Self {
            seat_no: seat.key.seat_no.value(),
            category: seat.category,
            price: seat.asking_price().as_decimal(),
            status: seat.status.public(),
        }
    }
}

/// The shopper's selection.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectionView {
    /// Event
    pub event_id: String,
    /// Showtime
    pub event_date_time: DateTime<Utc>,
    /// Held and reserved seats
    pub seats: Vec<SeatView>,
    /// Shared expiry
    pub expires_at: Option<DateTime<Utc>>,
    /// When the selection started
    pub created_at: Option<DateTime<Utc>>,
}

impl From<Selection> for SelectionView {
    fn from(selection: Selection) -> Self {
        Self {
            event_id: selection.showtime.event_id.to_string(),
            event_date_time: selection.showtime.event_datetime,
            seats: selection.seats.iter().map(SeatView::from).collect(),
            expires_at: selection.expires_at,
            created_at: selection.created_at,
        }
    }
}

/// Seat map of a showtime, ordered by seat number.
///
/// # Example
///
/// ```bash
/// curl http://localhost:8080/seats/evt-1/2025-03-01T12:00:00Z
/// ```
///
/// ```json
/// { "code": 200, "data": [{ "seatNo": 1, "category": "A", "price": 50.0, "status": "available" }] }
/// ```
pub async fn list_seats(
    State(state): State<AppState>,
    Path((event_id, event_datetime)): Path<(String, String)>,
) -> WebResult<Json<Envelope<Vec<SeatView>>>> {
    let showtime = parse_showtime(&event_id, &event_datetime)?;
    let seats = state.ticketing.inventory.list_seats(&showtime).await?;
    Ok(Json(Envelope::ok(seats.iter().map(SeatView::from).collect())))
}

/// Toggle a seat in the caller's selection.
///
/// Returns `{"action": "selected", "expiresAt": ...}` or `{"action": "deselected"}`.
pub async fn select_seat(
    Shopper(shopper): Shopper,
    State(state): State<AppState>,
    Path((event_id, event_datetime, seat_no)): Path<(String, String, u32)>,
) -> WebResult<Json<SelectOutcome>> {
    let key = parse_showtime(&event_id, &event_datetime)?.seat(SeatNo(seat_no));
    let outcome = state.ticketing.reservations.select_seat(&shopper, &key).await?;
    Ok(Json(outcome))
}

/// Release a seat the caller holds.
pub async fn deselect_seat(
    Shopper(shopper): Shopper,
    State(state): State<AppState>,
    Path((event_id, event_datetime, seat_no)): Path<(String, String, u32)>,
) -> WebResult<StatusCode> {
    let key = parse_showtime(&event_id, &event_datetime)?.seat(SeatNo(seat_no));
    state.ticketing.reservations.deselect_seat(&shopper, &key).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// The caller's current selection for a showtime.
pub async fn get_selection(
    Shopper(shopper): Shopper,
    State(state): State<AppState>,
    Path((event_id, event_datetime)): Path<(String, String)>,
) -> WebResult<Json<SelectionView>> {
    let showtime = parse_showtime(&event_id, &event_datetime)?;
    let selection = state.ticketing.reservations.selection(&shopper, &showtime).await?;
    Ok(Json(selection.into()))
}
