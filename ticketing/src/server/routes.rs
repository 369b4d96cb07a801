//! Router configuration for the ticketing service.

use super::state::AppState;
use crate::api::{checkout, resale, seats, tickets};
use axum::{
    Router,
    routing::{get, post},
};
use boxoffice_web::correlation_id_layer;
use boxoffice_web::handlers::{health_check, readiness_check};
use tower_http::trace::TraceLayer;

/// Build the complete Axum router.
///
/// Shopper-scoped routes read the `X-Shopper-Id` header set by the auth
/// proxy; health, seat map, verification and check-in are public.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        // Health checks
        .route("/health", get(health_check))
        .route("/ready", get(readiness_check))
        // Seat map and selection
        .route("/seats/:event_id/:event_datetime", get(seats::list_seats))
        .route(
            "/seats/:event_id/:event_datetime/:seat_no/select",
            post(seats::select_seat).delete(seats::deselect_seat),
        )
        .route("/selection/:event_id/:event_datetime", get(seats::get_selection))
        // Checkout
        .route("/checkout", post(checkout::start_checkout))
        .route("/verify-payment", get(checkout::verify_payment))
        // Tickets
        .route("/tickets/:owner_id", get(tickets::tickets_for_owner))
        .route(
            "/ticket/:ticket_id/checkin",
            get(tickets::checkin_status).post(tickets::check_in),
        )
        // Resale
        .route(
            "/sellticket/:ticket_id",
            post(resale::list_for_resale).delete(resale::withdraw_listing),
        )
        .route("/resale/:ticket_id/reserve", post(resale::reserve_resale))
        .route("/resale/:ticket_id/checkout", post(resale::start_resale_checkout))
        .layer(TraceLayer::new_for_http())
        .layer(correlation_id_layer())
        .with_state(state)
}
