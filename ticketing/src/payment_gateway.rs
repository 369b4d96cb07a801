//! HTTP client for the payment provider service.
//!
//! The provider wraps a hosted checkout (Stripe-style) behind two endpoints:
//!
//! - `POST {base}/start-checkout` returns `{checkout_url, session_id}`
//! - `GET {base}/verify-payment?session_id=…` returns `{payment_intent_id}`,
//!   absent or `null` while unpaid
//!
//! Timeouts and retries are applied by the caller (see [`crate::retry`]).

use boxoffice_core::BoxFuture;
use boxoffice_core::payment::{CheckoutRequest, PaymentError, PaymentProvider, ProviderSession};
use boxoffice_core::types::{PaymentId, SessionId};
use reqwest::Client;
use serde::{Deserialize, Serialize};

#[derive(Serialize)]
struct StartCheckoutBody<'a> {
    mode: &'a str,
    success_url: &'a str,
    cancel_url: &'a str,
    currency: &'a str,
    product_name: &'a str,
    unit_amount: u64,
    quantity: u32,
}

#[derive(Deserialize)]
struct StartCheckoutResponse {
    checkout_url: String,
    session_id: String,
}

#[derive(Deserialize)]
struct VerifyPaymentResponse {
    #[serde(default)]
    payment_intent_id: Option<String>,
}

/// Payment provider reached over HTTP.
#[derive(Clone, Debug)]
pub struct HttpPaymentProvider {
    base_url: String,
    http_client: Client,
}

impl HttpPaymentProvider {
    /// Create a client for the provider at `base_url`.
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(base_url, Client::new())
    }

    /// Create a client reusing an existing `reqwest` client.
    #[must_use]
    pub fn with_client(base_url: impl Into<String>, http_client: Client) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            http_client,
        }
    }

    async fn start_checkout(&self, request: CheckoutRequest) -> Result<ProviderSession, PaymentError> {
        let body = StartCheckoutBody {
            mode: &request.mode,
            success_url: &request.success_url,
            cancel_url: &request.cancel_url,
            currency: &request.currency,
            product_name: &request.product_name,
            unit_amount: request.unit_amount.cents(),
            quantity: request.quantity,
        };

        let response = self
            .http_client
            .post(format!("{}/start-checkout", self.base_url))
            .json(&body)
            .send()
            .await
            .map_err(transport_error)?;
        let response = ensure_success(response).await?;

        let created: StartCheckoutResponse = response
            .json()
            .await
            .map_err(|e| PaymentError::InvalidResponse(e.to_string()))?;
        let session_id = created
            .session_id
            .parse::<SessionId>()
            .map_err(|e| PaymentError::InvalidResponse(e.to_string()))?;
        if created.checkout_url.trim().is_empty() {
            return Err(PaymentError::InvalidResponse("empty checkout_url".to_string()));
        }

        tracing::debug!(session_id = %session_id, "Provider checkout session created");
        Ok(ProviderSession {
            session_id,
            checkout_url: created.checkout_url,
        })
    }

    async fn check_payment(&self, session_id: &SessionId) -> Result<Option<PaymentId>, PaymentError> {
        let response = self
            .http_client
            .get(format!("{}/verify-payment", self.base_url))
            .query(&[("session_id", session_id.as_str())])
            .send()
            .await
            .map_err(transport_error)?;
        let response = ensure_success(response).await?;

        let verified: VerifyPaymentResponse = response
            .json()
            .await
            .map_err(|e| PaymentError::InvalidResponse(e.to_string()))?;

        Ok(verified
            .payment_intent_id
            .and_then(|id| id.parse::<PaymentId>().ok()))
    }
}

fn transport_error(error: reqwest::Error) -> PaymentError {
    if error.is_timeout() {
        PaymentError::Timeout
    } else {
        PaymentError::Transport(error.to_string())
    }
}

async fn ensure_success(response: reqwest::Response) -> Result<reqwest::Response, PaymentError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let message = response.text().await.unwrap_or_default();
    Err(PaymentError::Rejected {
        status: status.as_u16(),
        message,
    })
}

impl PaymentProvider for HttpPaymentProvider {
    fn create_checkout(&self, request: CheckoutRequest) -> BoxFuture<'_, Result<ProviderSession, PaymentError>> {
        Box::pin(self.start_checkout(request))
    }

    fn verify_payment<'a>(
        &'a self,
        session_id: &'a SessionId,
    ) -> BoxFuture<'a, Result<Option<PaymentId>, PaymentError>> {
        Box::pin(self.check_payment(session_id))
    }
}
