//! Downstream collaborators notified after reconciliation.
//!
//! The durable record of a sale is the ticket written by the `CheckoutStore`.
//! These collaborators (the ticket service that emails/renders tickets, the
//! transaction ledger that pays out resale sellers) are told afterwards and
//! their failures never undo a sale.

use crate::BoxFuture;
use crate::types::{Money, PaymentId, ShopperId, Ticket, TicketId};
use thiserror::Error;

/// Collaborator call failure.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{collaborator} call failed: {message}")]
pub struct CollaboratorError {
    /// Which collaborator failed
    pub collaborator: &'static str,
    /// Failure detail
    pub message: String,
}

impl CollaboratorError {
    /// Creates a new error for `collaborator`.
    #[must_use]
    pub fn new(collaborator: &'static str, message: impl Into<String>) -> Self {
        Self {
            collaborator,
            message: message.into(),
        }
    }
}

/// A completed purchase, in the shape the ticket service consumes.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PurchaseRecord {
    /// Buyer
    pub user_id: ShopperId,
    /// Tickets issued, all for one showtime
    pub tickets: Vec<Ticket>,
}

/// Ticket service fed with completed purchases.
pub trait TicketPublisher: Send + Sync {
    /// Publish a completed purchase.
    ///
    /// # Errors
    ///
    /// Returns [`CollaboratorError`] if the ticket service rejects or cannot be reached.
    fn publish_purchase(&self, record: PurchaseRecord) -> BoxFuture<'_, Result<(), CollaboratorError>>;
}

/// A payout owed to a resale seller.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SettlementRecord {
    /// Seller being credited
    pub seller: ShopperId,
    /// Ticket sold
    pub ticket_id: TicketId,
    /// Buyer's payment
    pub payment_id: PaymentId,
    /// Amount owed to the seller
    pub amount: Money,
}

/// Ledger that settles resale proceeds with the original owner.
pub trait SettlementLedger: Send + Sync {
    /// Credit the seller.
    ///
    /// # Errors
    ///
    /// Returns [`CollaboratorError`] if the ledger rejects or cannot be reached.
    fn credit_seller(&self, record: SettlementRecord) -> BoxFuture<'_, Result<(), CollaboratorError>>;
}

/// Publisher that drops every record. Used when no ticket service is configured.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopPublisher;

impl TicketPublisher for NoopPublisher {
    fn publish_purchase(&self, _record: PurchaseRecord) -> BoxFuture<'_, Result<(), CollaboratorError>> {
        Box::pin(async { Ok(()) })
    }
}

/// Ledger that drops every record. Used when no ledger is configured.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopLedger;

impl SettlementLedger for NoopLedger {
    fn credit_seller(&self, _record: SettlementRecord) -> BoxFuture<'_, Result<(), CollaboratorError>> {
        Box::pin(async { Ok(()) })
    }
}
