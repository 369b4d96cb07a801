//! Scriptable payment provider and recording collaborators.

#![allow(clippy::unwrap_used)] // Test infrastructure uses unwrap for simplicity
#![allow(clippy::missing_panics_doc)] // Panics only on a poisoned lock

use boxoffice_core::BoxFuture;
use boxoffice_core::collaborators::{
    CollaboratorError, PurchaseRecord, SettlementLedger, SettlementRecord, TicketPublisher,
};
use boxoffice_core::payment::{CheckoutRequest, PaymentError, PaymentProvider, ProviderSession};
use boxoffice_core::types::{PaymentId, SessionId};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Debug, Default)]
struct ProviderScript {
    create_failures: VecDeque<PaymentError>,
    create_delays: VecDeque<Duration>,
    verify_failures: VecDeque<PaymentError>,
    paid: HashMap<SessionId, PaymentId>,
    auto_pay: bool,
    requests: Vec<CheckoutRequest>,
    issued: u64,
}

/// Payment provider whose answers are scripted by the test.
///
/// Sessions are issued as `cs_test_1`, `cs_test_2`, ... Unless
/// [`auto_pay`](Self::auto_pay) is on, a session reads as unpaid until
/// [`mark_paid`](Self::mark_paid) is called.
///
/// # Example
///
/// ```
/// use boxoffice_testing::MockPaymentProvider;
/// use boxoffice_core::payment::PaymentError;
///
/// let provider = MockPaymentProvider::new();
/// provider.fail_next_create(PaymentError::Timeout);
/// assert_eq!(provider.create_calls(), 0);
/// ```
#[derive(Clone, Debug, Default)]
pub struct MockPaymentProvider {
    script: Arc<Mutex<ProviderScript>>,
    create_calls: Arc<AtomicUsize>,
    verify_calls: Arc<AtomicUsize>,
}

impl MockPaymentProvider {
    /// Create a provider that succeeds and reports nothing paid
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Report every new session as paid immediately.
    #[must_use]
    pub fn auto_pay(self) -> Self {
        self.script.lock().unwrap().auto_pay = true;
        self
    }

    /// Queue a failure for the next `create_checkout` call.
    pub fn fail_next_create(&self, error: PaymentError) {
        self.script.lock().unwrap().create_failures.push_back(error);
    }

    /// Queue a delay for the next `create_checkout` call.
    pub fn delay_next_create(&self, delay: Duration) {
        self.script.lock().unwrap().create_delays.push_back(delay);
    }

    /// Queue a failure for the next `verify_payment` call.
    pub fn fail_next_verify(&self, error: PaymentError) {
        self.script.lock().unwrap().verify_failures.push_back(error);
    }

    /// Mark `session_id` paid and return its payment id (`pi_<session>`).
    pub fn mark_paid(&self, session_id: &SessionId) -> PaymentId {
        let payment_id = PaymentId::new(format!("pi_{session_id}"));
        self.script
            .lock()
            .unwrap()
            .paid
            .insert(session_id.clone(), payment_id.clone());
        payment_id
    }

    /// Number of `create_checkout` calls, including failed ones.
    #[must_use]
    pub fn create_calls(&self) -> usize {
        self.create_calls.load(Ordering::SeqCst)
    }

    /// Number of `verify_payment` calls, including failed ones.
    #[must_use]
    pub fn verify_calls(&self) -> usize {
        self.verify_calls.load(Ordering::SeqCst)
    }

    /// Every request that reached the provider, oldest first.
    #[must_use]
    pub fn requests(&self) -> Vec<CheckoutRequest> {
        self.script.lock().unwrap().requests.clone()
    }
}

impl PaymentProvider for MockPaymentProvider {
    fn create_checkout(&self, request: CheckoutRequest) -> BoxFuture<'_, Result<ProviderSession, PaymentError>> {
        Box::pin(async move {
            self.create_calls.fetch_add(1, Ordering::SeqCst);
            let delay = self.script.lock().unwrap().create_delays.pop_front();
            if let Some(delay) = delay {
                tokio::time::sleep(delay).await;
            }

            let mut script = self.script.lock().unwrap();
            script.requests.push(request);
            if let Some(error) = script.create_failures.pop_front() {
                return Err(error);
            }

            script.issued += 1;
            let session_id = SessionId::new(format!("cs_test_{}", script.issued));
            if script.auto_pay {
                let payment_id = PaymentId::new(format!("pi_{session_id}"));
                script.paid.insert(session_id.clone(), payment_id);
            }
            Ok(ProviderSession {
                checkout_url: format!("https://checkout.test/pay/{session_id}"),
                session_id,
            })
        })
    }

    fn verify_payment<'a>(
        &'a self,
        session_id: &'a SessionId,
    ) -> BoxFuture<'a, Result<Option<PaymentId>, PaymentError>> {
        Box::pin(async move {
            self.verify_calls.fetch_add(1, Ordering::SeqCst);
            let mut script = self.script.lock().unwrap();
            if let Some(error) = script.verify_failures.pop_front() {
                return Err(error);
            }
            Ok(script.paid.get(session_id).cloned())
        })
    }
}

/// Ticket publisher that records every purchase.
#[derive(Clone, Debug, Default)]
pub struct RecordingTicketPublisher {
    records: Arc<Mutex<Vec<PurchaseRecord>>>,
    failing: Arc<AtomicBool>,
}

impl RecordingTicketPublisher {
    /// Create an empty publisher
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make subsequent calls fail (after recording).
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Purchases published so far.
    #[must_use]
    pub fn records(&self) -> Vec<PurchaseRecord> {
        self.records.lock().unwrap().clone()
    }
}

impl TicketPublisher for RecordingTicketPublisher {
    fn publish_purchase(&self, record: PurchaseRecord) -> BoxFuture<'_, Result<(), CollaboratorError>> {
        Box::pin(async move {
            self.records.lock().unwrap().push(record);
            if self.failing.load(Ordering::SeqCst) {
                return Err(CollaboratorError::new("ticket service", "scripted failure"));
            }
            Ok(())
        })
    }
}

/// Settlement ledger that records every credit.
#[derive(Clone, Debug, Default)]
pub struct RecordingLedger {
    records: Arc<Mutex<Vec<SettlementRecord>>>,
    failing: Arc<AtomicBool>,
}

impl RecordingLedger {
    /// Create an empty ledger
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make subsequent calls fail (after recording).
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Credits recorded so far.
    #[must_use]
    pub fn records(&self) -> Vec<SettlementRecord> {
        self.records.lock().unwrap().clone()
    }
}

impl SettlementLedger for RecordingLedger {
    fn credit_seller(&self, record: SettlementRecord) -> BoxFuture<'_, Result<(), CollaboratorError>> {
        Box::pin(async move {
            self.records.lock().unwrap().push(record);
            if self.failing.load(Ordering::SeqCst) {
                return Err(CollaboratorError::new("ledger", "scripted failure"));
            }
            Ok(())
        })
    }
}
