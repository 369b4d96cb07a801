//! HTTP clients for the ticket service and the transaction ledger.
//!
//! Both are told about a sale after it is committed. A duplicate answer
//! (`409`) from the ledger counts as success since the settlement is keyed by
//! the buyer's payment id.

use boxoffice_core::BoxFuture;
use boxoffice_core::collaborators::{
    CollaboratorError, PurchaseRecord, SettlementLedger, SettlementRecord, TicketPublisher,
};
use chrono::{DateTime, Utc};
use reqwest::{Client, StatusCode};
use serde::Serialize;
use std::time::Duration;

const TICKET_SERVICE: &str = "ticket service";
const LEDGER: &str = "ledger";

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PurchasedSeat<'a> {
    seat_no: u32,
    seat_category: &'a str,
    price: f64,
    #[serde(rename = "paymentID")]
    payment_id: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct BuyTicketBody<'a> {
    #[serde(rename = "userID")]
    user_id: &'a str,
    #[serde(rename = "eventID")]
    event_id: &'a str,
    event_date_time: DateTime<Utc>,
    event_name: &'a str,
    seats: Vec<PurchasedSeat<'a>>,
}

#[derive(Serialize)]
struct TransactionBody<'a> {
    #[serde(rename = "transactionID")]
    transaction_id: &'a str,
    #[serde(rename = "type")]
    kind: &'static str,
    #[serde(rename = "userID")]
    user_id: &'a str,
    #[serde(rename = "ticketID")]
    ticket_id: String,
    #[serde(rename = "chargeID")]
    charge_id: &'a str,
    amount: f64,
}

fn http_client(timeout: Duration) -> Client {
    Client::builder().timeout(timeout).build().unwrap_or_default()
}

/// Publishes completed purchases to `POST {base}/buyticket`.
#[derive(Clone, Debug)]
pub struct HttpTicketPublisher {
    base_url: String,
    http_client: Client,
}

impl HttpTicketPublisher {
    /// Create a publisher for the ticket service at `base_url`.
    #[must_use]
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            http_client: http_client(timeout),
        }
    }

    async fn publish(&self, record: PurchaseRecord) -> Result<(), CollaboratorError> {
        let Some(first) = record.tickets.first() else {
            return Ok(());
        };
        let body = BuyTicketBody {
            user_id: record.user_id.as_str(),
            event_id: first.event_id.as_str(),
            event_date_time: first.event_datetime,
            event_name: &first.event_name,
            seats: record
                .tickets
                .iter()
                .map(|ticket| PurchasedSeat {
                    seat_no: ticket.seat_no.value(),
                    seat_category: ticket.seat_category.as_str(),
                    price: ticket.price.as_decimal(),
                    payment_id: ticket.payment_id.as_str(),
                })
                .collect(),
        };

        let response = self
            .http_client
            .post(format!("{}/buyticket", self.base_url))
            .json(&body)
            .send()
            .await
            .map_err(|e| CollaboratorError::new(TICKET_SERVICE, e.to_string()))?;

        if !response.status().is_success() {
            return Err(CollaboratorError::new(
                TICKET_SERVICE,
                format!("unexpected status {}", response.status()),
            ));
        }
        Ok(())
    }
}

impl TicketPublisher for HttpTicketPublisher {
    fn publish_purchase(&self, record: PurchaseRecord) -> BoxFuture<'_, Result<(), CollaboratorError>> {
        Box::pin(self.publish(record))
    }
}

/// Credits resale sellers through `POST {base}/transaction`.
#[derive(Clone, Debug)]
pub struct HttpSettlementLedger {
    base_url: String,
    http_client: Client,
}

impl HttpSettlementLedger {
    /// Create a ledger client for `base_url`.
    #[must_use]
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            http_client: http_client(timeout),
        }
    }

    async fn credit(&self, record: SettlementRecord) -> Result<(), CollaboratorError> {
        let body = TransactionBody {
            transaction_id: record.payment_id.as_str(),
            kind: "purchase",
            user_id: record.seller.as_str(),
            ticket_id: record.ticket_id.to_string(),
            charge_id: record.payment_id.as_str(),
            amount: record.amount.as_decimal(),
        };

        let response = self
            .http_client
            .post(format!("{}/transaction", self.base_url))
            .json(&body)
            .send()
            .await
            .map_err(|e| CollaboratorError::new(LEDGER, e.to_string()))?;

        match response.status() {
            status if status.is_success() => Ok(()),
            StatusCode::CONFLICT => {
                tracing::debug!(payment_id = %record.payment_id, "Settlement already recorded");
                Ok(())
            }
            status => Err(CollaboratorError::new(LEDGER, format!("unexpected status {status}"))),
        }
    }
}

impl SettlementLedger for HttpSettlementLedger {
    fn credit_seller(&self, record: SettlementRecord) -> BoxFuture<'_, Result<(), CollaboratorError>> {
        Box::pin(self.credit(record))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use axum::routing::post;
    use axum::{Json, Router, http::StatusCode as AxumStatus};
    use boxoffice_core::types::{Money, PaymentId, ShopperId, TicketId};
    use serde_json::Value;
    use std::sync::{Arc, Mutex};

    async fn serve(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{address}")
    }

    fn settlement() -> SettlementRecord {
        SettlementRecord {
            seller: ShopperId::new("seller-1"),
            ticket_id: TicketId::new(),
            payment_id: PaymentId::new("pi_9"),
            amount: Money::from_cents(3000),
        }
    }

    #[tokio::test]
    async fn test_ledger_body_shape() {
        let seen: Arc<Mutex<Option<Value>>> = Arc::default();
        let captured = Arc::clone(&seen);
        let router = Router::new().route(
            "/transaction",
            post(move |Json(body): Json<Value>| async move {
                *captured.lock().unwrap() = Some(body);
                AxumStatus::CREATED
            }),
        );
        let ledger = HttpSettlementLedger::new(serve(router).await, Duration::from_secs(2));

        ledger.credit_seller(settlement()).await.unwrap();

        let body = seen.lock().unwrap().clone().unwrap();
        assert_eq!(body["type"], "purchase");
        assert_eq!(body["userID"], "seller-1");
        assert_eq!(body["chargeID"], "pi_9");
        assert_eq!(body["amount"], 30.0);
    }

    #[tokio::test]
    async fn test_ledger_duplicate_is_success() {
        let router = Router::new().route("/transaction", post(|| async { AxumStatus::CONFLICT }));
        let ledger = HttpSettlementLedger::new(serve(router).await, Duration::from_secs(2));

        assert!(ledger.credit_seller(settlement()).await.is_ok());
    }

    #[tokio::test]
    async fn test_publisher_error_status() {
        let router = Router::new().route(
            "/buyticket",
            post(|| async { AxumStatus::INTERNAL_SERVER_ERROR }),
        );
        let publisher = HttpTicketPublisher::new(serve(router).await, Duration::from_secs(2));
        let ticket = boxoffice_core::types::Ticket {
            ticket_id: TicketId::new(),
            owner_id: ShopperId::new("buyer"),
            event_id: boxoffice_core::types::EventId::new("evt"),
            event_name: "Concert".into(),
            event_datetime: Utc::now(),
            seat_no: boxoffice_core::types::SeatNo(4),
            seat_category: boxoffice_core::types::SeatCategory::A,
            price: Money::from_cents(5000),
            resale_price: None,
            payment_id: PaymentId::new("pi_1"),
            session_id: boxoffice_core::types::SessionId::new("cs_1"),
            is_checked_in: false,
            status: boxoffice_core::types::TicketStatus::Confirmed,
            purchased_at: Utc::now(),
        };

        let err = publisher
            .publish_purchase(PurchaseRecord {
                user_id: ShopperId::new("buyer"),
                tickets: vec![ticket],
            })
            .await
            .unwrap_err();
        assert_eq!(err.collaborator, "ticket service");
    }
}
