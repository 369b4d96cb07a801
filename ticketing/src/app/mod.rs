//! Seat selection, checkout, resale and check-in managers.
//!
//! Managers are stateless: every seat change goes through the store's
//! compare-and-swap, so any number of handler tasks (or server replicas) can
//! call them concurrently. Dependencies are injected through
//! [`TicketingEnvironment`].
//!
//! ```text
//! select ──► held ──► startCheckout ──► reserved ──► verify ──► sold ──► Ticket
//!   ▲          │                           │
//!   └─ toggle ─┘        provider failure ◄─┘ (rolled back to held)
//!
//! sold ──► listForResale ──► resale_listed ──► reserveResale ──► reserved_for_resale
//!                                 ▲                                     │
//!                                 └────────── expiry ◄──────────────────┤
//!                                                 finalizeResale ──► sold (new owner)
//! ```

pub mod checkin;
pub mod checkout;
pub mod inventory;
pub mod resale;
pub mod reservation;

pub use checkin::{CheckInService, CheckInStatus};
pub use checkout::{CheckoutOrchestrator, CheckoutSettings, CheckoutStarted, StartCheckout};
pub use inventory::InventoryService;
pub use resale::ResaleManager;
pub use reservation::{ReservationManager, SelectOutcome, Selection};

use crate::config::ReservationConfig;
use boxoffice_core::collaborators::{NoopLedger, NoopPublisher, SettlementLedger, TicketPublisher};
use boxoffice_core::environment::Clock;
use boxoffice_core::payment::PaymentProvider;
use boxoffice_core::store::{CheckoutStore, InventoryStore, TicketStore};
use std::sync::Arc;

/// Everything the managers depend on.
#[derive(Clone)]
pub struct TicketingEnvironment {
    /// Clock for hold expiry and timestamps
    pub clock: Arc<dyn Clock>,
    /// Seat inventory
    pub inventory: Arc<dyn InventoryStore>,
    /// Ticket records
    pub tickets: Arc<dyn TicketStore>,
    /// Checkout sessions
    pub checkouts: Arc<dyn CheckoutStore>,
    /// Payment provider
    pub payments: Arc<dyn PaymentProvider>,
    /// Ticket service notified of purchases
    pub publisher: Arc<dyn TicketPublisher>,
    /// Ledger crediting resale sellers
    pub ledger: Arc<dyn SettlementLedger>,
}

impl TicketingEnvironment {
    /// Build an environment around one store implementing every store trait.
    ///
    /// Collaborators default to no-ops.
    #[must_use]
    pub fn new<S>(clock: Arc<dyn Clock>, store: Arc<S>, payments: Arc<dyn PaymentProvider>) -> Self
    where
        S: InventoryStore + TicketStore + CheckoutStore + 'static,
    {
        Self {
            clock,
            inventory: store.clone(),
            tickets: store.clone(),
            checkouts: store,
            payments,
            publisher: Arc::new(NoopPublisher),
            ledger: Arc::new(NoopLedger),
        }
    }

    /// Use `publisher` for purchase notifications.
    #[must_use]
    pub fn with_publisher(mut self, publisher: Arc<dyn TicketPublisher>) -> Self {
        self.publisher = publisher;
        self
    }

    /// Use `ledger` for seller settlement.
    #[must_use]
    pub fn with_ledger(mut self, ledger: Arc<dyn SettlementLedger>) -> Self {
        self.ledger = ledger;
        self
    }
}

/// All managers, sharing one environment.
#[derive(Clone)]
pub struct Ticketing {
    /// Seat map reads, seeding and audit
    pub inventory: InventoryService,
    /// Seat selection and holds
    pub reservations: ReservationManager,
    /// Primary checkout and reconciliation
    pub checkout: CheckoutOrchestrator,
    /// Resale listings and resale checkout
    pub resale: ResaleManager,
    /// Venue check-in
    pub checkin: CheckInService,
}

impl Ticketing {
    /// Wire every manager to `env`.
    #[must_use]
    pub fn new(env: TicketingEnvironment, reservation: ReservationConfig, settings: CheckoutSettings) -> Self {
        let env = Arc::new(env);
        Self {
            inventory: InventoryService::new(Arc::clone(&env)),
            reservations: ReservationManager::new(Arc::clone(&env), reservation.clone()),
            checkout: CheckoutOrchestrator::new(Arc::clone(&env), settings.clone()),
            resale: ResaleManager::new(Arc::clone(&env), reservation, settings),
            checkin: CheckInService::new(env),
        }
    }
}
