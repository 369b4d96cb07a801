//! Payment provider contract.
//!
//! The core issues exactly two calls to the provider: create a hosted checkout
//! session, and later ask whether that session was paid. Everything else about
//! payment (card entry, 3DS, receipts) happens on the provider's pages.

use crate::BoxFuture;
use crate::types::{Money, PaymentId, SessionId};
use thiserror::Error;

/// Placeholder the provider substitutes with the real session id in redirect URLs.
pub const SESSION_ID_PLACEHOLDER: &str = "{CHECKOUT_SESSION_ID}";

/// Payment provider errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PaymentError {
    /// The provider did not answer within the configured timeout.
    #[error("Payment provider timed out")]
    Timeout,

    /// The provider answered with an error status.
    #[error("Payment provider rejected the request ({status}): {message}")]
    Rejected {
        /// HTTP status code
        status: u16,
        /// Provider message
        message: String,
    },

    /// Connection-level failure.
    #[error("Payment provider unreachable: {0}")]
    Transport(String),

    /// The provider answered with a body we could not use.
    #[error("Invalid payment provider response: {0}")]
    InvalidResponse(String),
}

impl PaymentError {
    /// Whether a retry could plausibly succeed.
    ///
    /// Client errors (4xx) are deterministic and are not retried.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        match self {
            Self::Timeout | Self::Transport(_) => true,
            Self::Rejected { status, .. } => *status >= 500,
            Self::InvalidResponse(_) => false,
        }
    }
}

/// Body of `POST /start-checkout`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CheckoutRequest {
    /// Provider checkout mode, always `payment` for ticket sales
    pub mode: String,
    /// Redirect after payment; contains [`SESSION_ID_PLACEHOLDER`]
    pub success_url: String,
    /// Redirect when the shopper abandons the provider page
    pub cancel_url: String,
    /// Lowercase ISO currency
    pub currency: String,
    /// Line item label shown by the provider
    pub product_name: String,
    /// Price per unit
    pub unit_amount: Money,
    /// Number of units
    pub quantity: u32,
}

impl CheckoutRequest {
    /// Total the provider will charge.
    #[must_use]
    pub fn total(&self) -> Option<Money> {
        self.unit_amount
            .cents()
            .checked_mul(u64::from(self.quantity))
            .map(Money::from_cents)
    }
}

/// A created provider session.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProviderSession {
    /// Provider session id
    pub session_id: SessionId,
    /// Hosted page the shopper is redirected to
    pub checkout_url: String,
}

/// External payment provider.
pub trait PaymentProvider: Send + Sync {
    /// Create a hosted checkout session.
    ///
    /// # Errors
    ///
    /// Returns a [`PaymentError`] if the provider fails or times out.
    fn create_checkout(&self, request: CheckoutRequest) -> BoxFuture<'_, Result<ProviderSession, PaymentError>>;

    /// Ask whether a session has been paid.
    ///
    /// `Ok(None)` means the provider reports no payment (yet).
    ///
    /// # Errors
    ///
    /// Returns a [`PaymentError`] if the provider fails or times out.
    fn verify_payment<'a>(
        &'a self,
        session_id: &'a SessionId,
    ) -> BoxFuture<'a, Result<Option<PaymentId>, PaymentError>>;
}
