//! Business metrics for the ticketing service.
//!
//! # Exported Metrics
//!
//! ## Counters
//! - `ticketing_holds_total{outcome}` - Seat holds by outcome (created, released, expired)
//! - `ticketing_checkouts_total{status}` - Checkouts by status (started, failed, verified, unconfirmed)
//! - `ticketing_tickets_sold_total{channel}` - Tickets sold (primary, resale)
//! - `ticketing_revenue_cents_total{channel}` - Revenue in cents
//! - `ticketing_reconciliation_conflicts_total` - Paid sessions whose seats could not be committed
//! - `ticketing_resale_listings_total{action}` - Listings created and withdrawn
//! - `ticketing_checkins_total` - Tickets scanned
//! - `ticketing_collaborator_failures_total{collaborator}` - Best-effort notifications that failed
//!
//! ## Histograms
//! - `ticketing_checkout_seats` - Seats per checkout
//! - `payment.provider.duration_seconds` - Provider call latency (recorded in [`crate::retry`])

use metrics::{describe_counter, describe_histogram};

/// Register descriptions for every business metric.
///
/// Call once at startup, after the exporter is installed.
pub fn register_business_metrics() {
    describe_counter!("ticketing_holds_total", "Seat holds by outcome (created, released, expired)");
    describe_counter!(
        "ticketing_checkouts_total",
        "Checkouts by status (started, failed, verified, unconfirmed)"
    );
    describe_counter!("ticketing_tickets_sold_total", "Tickets sold by channel");
    describe_counter!("ticketing_revenue_cents_total", "Revenue from confirmed payments in cents");
    describe_counter!(
        "ticketing_reconciliation_conflicts_total",
        "Paid sessions whose seats could not be committed (refund required)"
    );
    describe_counter!("ticketing_resale_listings_total", "Resale listings created and withdrawn");
    describe_counter!("ticketing_checkins_total", "Tickets checked in at the venue");
    describe_counter!(
        "ticketing_collaborator_failures_total",
        "Post-sale notifications that failed"
    );
    describe_histogram!("ticketing_checkout_seats", "Seats per started checkout");
    describe_histogram!("payment.provider.duration_seconds", "Payment provider call latency");

    tracing::info!("Business metrics registered");
}

/// A seat was put on hold.
pub fn record_hold_created() {
    metrics::counter!("ticketing_holds_total", "outcome" => "created").increment(1);
}

/// A shopper released a seat.
pub fn record_hold_released() {
    metrics::counter!("ticketing_holds_total", "outcome" => "released").increment(1);
}

/// The sweeper or a lazy read released lapsed holds.
pub fn record_holds_expired(count: usize) {
    if count > 0 {
        metrics::counter!("ticketing_holds_total", "outcome" => "expired").increment(count as u64);
    }
}

/// A provider checkout session was created.
pub fn record_checkout_started(seats: usize) {
    metrics::counter!("ticketing_checkouts_total", "status" => "started").increment(1);
    #[allow(clippy::cast_precision_loss)]
    metrics::histogram!("ticketing_checkout_seats").record(seats as f64);
}

/// Checkout could not be started.
pub fn record_checkout_failed(reason: &'static str) {
    metrics::counter!("ticketing_checkouts_total", "status" => "failed", "reason" => reason).increment(1);
}

/// Verification found no confirmed payment.
pub fn record_payment_unconfirmed() {
    metrics::counter!("ticketing_checkouts_total", "status" => "unconfirmed").increment(1);
}

/// A session was reconciled into tickets.
pub fn record_tickets_sold(channel: &'static str, count: usize, revenue_cents: u64) {
    metrics::counter!("ticketing_checkouts_total", "status" => "verified").increment(1);
    metrics::counter!("ticketing_tickets_sold_total", "channel" => channel).increment(count as u64);
    metrics::counter!("ticketing_revenue_cents_total", "channel" => channel).increment(revenue_cents);
    tracing::debug!(channel, count, revenue_cents, "Recorded tickets_sold metric");
}

/// A paid session hit a seat conflict during reconciliation.
pub fn record_reconciliation_conflict() {
    metrics::counter!("ticketing_reconciliation_conflicts_total").increment(1);
}

/// A ticket was listed for resale or withdrawn.
pub fn record_resale_listing(action: &'static str) {
    metrics::counter!("ticketing_resale_listings_total", "action" => action).increment(1);
}

/// A ticket was scanned.
pub fn record_check_in() {
    metrics::counter!("ticketing_checkins_total").increment(1);
}

/// A best-effort collaborator call failed.
pub fn record_collaborator_failure(collaborator: &'static str) {
    metrics::counter!("ticketing_collaborator_failures_total", "collaborator" => collaborator).increment(1);
}
