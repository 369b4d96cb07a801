//! Boxoffice ticketing service: seat selection, checkout and resale.
//!
//! The storefront shows a seat map per showtime. Shoppers select seats into a
//! short hold, check out through an external payment provider, and receive
//! tickets once the payment is confirmed. Ticket owners may list a ticket for
//! resale and another shopper can buy it through the same checkout flow.
//!
//! # Architecture
//!
//! ```text
//!            HTTP (axum)
//!                │
//!    ┌───────────┴────────────┐
//!    │  api handlers          │  X-Shopper-Id, JSON views, {code, message} errors
//!    └───────────┬────────────┘
//!                │
//!    ┌───────────┴────────────┐
//!    │  app managers          │  Reservation, Checkout, Resale, CheckIn
//!    └───┬───────┬────────┬───┘
//!        │       │        │
//!   seat store  payment  ticket service / ledger
//!   (CAS)       provider (best-effort)
//! ```
//!
//! # Concurrency
//!
//! Every seat change is a compare-and-swap on the seat's full state
//! (status, holder, expiry). Two shoppers racing for one seat produce exactly
//! one winner; the loser sees a conflict and no partial state survives a
//! failed multi-seat operation.
//!
//! # Expiry
//!
//! Holds carry an absolute expiry. Expired holds are released lazily on the
//! shopper's next interaction and eagerly by the background
//! [`ExpirySweeper`](runtime::ExpirySweeper).

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod api;
pub mod app;
pub mod bootstrap;
pub mod collaborators;
pub mod config;
pub mod error;
pub mod metrics;
pub mod payment_gateway;
pub mod retry;
pub mod runtime;
pub mod server;
pub mod validation;

pub use app::{
    CheckInService, CheckInStatus, CheckoutOrchestrator, CheckoutSettings, CheckoutStarted,
    InventoryService, ResaleManager, ReservationManager, SelectOutcome, Selection, StartCheckout,
    Ticketing, TicketingEnvironment,
};
pub use bootstrap::{ApplicationBuilder, ResourceManager};
pub use config::Config;
pub use error::{TicketingError, TicketingResult};
pub use retry::RetryPolicy;
pub use runtime::{Application, ExpirySweeper};
pub use server::{AppState, build_router};
