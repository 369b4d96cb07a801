//! Shared setup for the integration tests: an in-memory store seeded with a
//! small seat map, a manual clock and recording collaborators.

#![allow(dead_code)]
#![allow(clippy::unwrap_used)]

use boxoffice_core::store::InventoryStore;
use boxoffice_core::types::{Money, SeatCategory, SeatKey, SeatNo, SessionId, ShopperId, Ticket};
use boxoffice_testing::fixtures::{SeatMapBuilder, attendee, test_showtime};
use boxoffice_testing::{
    ContendedInventory, InMemoryStore, ManualClock, MockPaymentProvider, RecordingLedger,
    RecordingTicketPublisher,
};
use std::sync::Arc;
use std::time::Duration;
use ticketing::config::ReservationConfig;
use ticketing::{CheckoutSettings, RetryPolicy, StartCheckout, Ticketing, TicketingEnvironment};

/// Category A: seats 1-4 at 50.00. Category B: seats 5-10 at 30.00.
pub const CATEGORY_A_CENTS: u64 = 5000;
pub const CATEGORY_B_CENTS: u64 = 3000;

pub struct TestApp {
    pub ticketing: Ticketing,
    pub store: InMemoryStore,
    /// Seat inventory the managers see; arm it to lose a seat mid-checkout
    pub contention: ContendedInventory,
    pub clock: ManualClock,
    pub provider: MockPaymentProvider,
    pub publisher: RecordingTicketPublisher,
    pub ledger: RecordingLedger,
}

impl TestApp {
    pub async fn new() -> Self {
        Self::with_provider(MockPaymentProvider::new()).await
    }

    pub async fn with_provider(provider: MockPaymentProvider) -> Self {
        boxoffice_testing::init_tracing();

        let store = InMemoryStore::new();
        store
            .seed_seats(
                SeatMapBuilder::new(test_showtime())
                    .category(SeatCategory::A, 1..=4, Money::from_cents(CATEGORY_A_CENTS))
                    .category(SeatCategory::B, 5..=10, Money::from_cents(CATEGORY_B_CENTS))
                    .build(),
            )
            .await
            .unwrap();

        let clock = ManualClock::starting_at_test_time();
        let publisher = RecordingTicketPublisher::new();
        let ledger = RecordingLedger::new();
        let contention = ContendedInventory::new(store.clone());
        let mut env = TicketingEnvironment::new(
            Arc::new(clock.clone()),
            Arc::new(store.clone()),
            Arc::new(provider.clone()),
        )
        .with_publisher(Arc::new(publisher.clone()))
        .with_ledger(Arc::new(ledger.clone()));
        env.inventory = Arc::new(contention.clone());
        let settings = CheckoutSettings {
            retry: RetryPolicy::default().with_delay(Duration::ZERO),
            ..CheckoutSettings::default()
        };

        Self {
            ticketing: Ticketing::new(env, ReservationConfig::default(), settings),
            store,
            contention,
            clock,
            provider,
            publisher,
            ledger,
        }
    }

    /// Select `seats` for `shopper`, panicking on any refusal.
    pub async fn hold(&self, shopper: &ShopperId, seats: &[u32]) {
        for &no in seats {
            self.ticketing
                .reservations
                .select_seat(shopper, &seat(no))
                .await
                .unwrap();
        }
    }

    /// Hold, check out, pay and verify `seats` for `shopper`.
    pub async fn buy(&self, shopper: &ShopperId, seats: &[u32]) -> (SessionId, Vec<Ticket>) {
        self.hold(shopper, seats).await;
        let started = self
            .ticketing
            .checkout
            .start_checkout(shopper, order(seats))
            .await
            .unwrap();
        self.provider.mark_paid(&started.session_id);
        let tickets = self
            .ticketing
            .checkout
            .verify_and_finalize(&started.session_id)
            .await
            .unwrap();
        (started.session_id, tickets)
    }
}

pub fn seat(no: u32) -> SeatKey {
    test_showtime().seat(SeatNo(no))
}

/// A checkout for `seats` of the test showtime with one attendee per seat.
pub fn order(seats: &[u32]) -> StartCheckout {
    StartCheckout {
        showtime: test_showtime(),
        event_name: "Concert".to_string(),
        seats: seats.iter().copied().map(SeatNo).collect(),
        attendees: (1..=u32::try_from(seats.len()).unwrap()).map(attendee).collect(),
    }
}
