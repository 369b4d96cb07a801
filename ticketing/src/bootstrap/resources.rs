//! Resource management for infrastructure setup.
//!
//! `ResourceManager` connects the store, builds the payment provider client and
//! the optional post-sale collaborators from configuration.
//!
//! # Example
//!
//! ```rust,ignore
//! let config = Config::from_env();
//! let resources = ResourceManager::from_config(&config).await?;
//! let env = resources.environment();
//! ```

use crate::app::TicketingEnvironment;
use crate::collaborators::{HttpSettlementLedger, HttpTicketPublisher};
use crate::config::Config;
use crate::payment_gateway::HttpPaymentProvider;
use anyhow::Context;
use boxoffice_core::collaborators::{NoopLedger, NoopPublisher, SettlementLedger, TicketPublisher};
use boxoffice_core::environment::{Clock, SystemClock};
use boxoffice_core::payment::PaymentProvider;
use boxoffice_postgres::PostgresStore;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// Central resource manager for all infrastructure components.
#[derive(Clone)]
pub struct ResourceManager {
    /// Application configuration
    pub config: Arc<Config>,

    /// System clock for hold expiry and timestamps
    pub clock: Arc<dyn Clock>,

    /// Seat, ticket and session store
    pub store: Arc<PostgresStore>,

    /// Payment provider client
    pub payments: Arc<dyn PaymentProvider>,

    /// Ticket service notifications
    pub publisher: Arc<dyn TicketPublisher>,

    /// Seller settlement
    pub ledger: Arc<dyn SettlementLedger>,
}

impl ResourceManager {
    /// Initialize all infrastructure resources from configuration.
    ///
    /// # Errors
    ///
    /// Returns error if the database connection or migrations fail.
    pub async fn from_config(config: &Config) -> anyhow::Result<Self> {
        info!("Connecting to seat store database...");
        let store = PostgresStore::connect_with(
            &config.postgres.url,
            config.postgres.max_connections,
            Duration::from_secs(config.postgres.connect_timeout),
        )
        .await
        .context("connecting to PostgreSQL")?;

        if config.postgres.run_migrations {
            info!("Running migrations...");
            store.migrate().await.context("running migrations")?;
            info!("Migrations complete");
        }
        info!("Seat store connected");

        let timeout = config.payment.request_timeout();
        let payments: Arc<dyn PaymentProvider> =
            Arc::new(HttpPaymentProvider::new(&config.payment.provider_url));
        info!(provider = %config.payment.provider_url, "Payment provider configured");

        let publisher: Arc<dyn TicketPublisher> = match &config.collaborators.ticket_service_url {
            Some(url) => {
                info!(url = %url, "Ticket service notifications enabled");
                Arc::new(HttpTicketPublisher::new(url, timeout))
            }
            None => {
                warn!("TICKET_SERVICE_URL not set, purchases will not be published");
                Arc::new(NoopPublisher)
            }
        };
        let ledger: Arc<dyn SettlementLedger> = match &config.collaborators.ledger_url {
            Some(url) => {
                info!(url = %url, "Seller settlement enabled");
                Arc::new(HttpSettlementLedger::new(url, timeout))
            }
            None => {
                warn!("LEDGER_URL not set, resale sellers will not be credited");
                Arc::new(NoopLedger)
            }
        };

        Ok(Self {
            config: Arc::new(config.clone()),
            clock: Arc::new(SystemClock),
            store: Arc::new(store),
            payments,
            publisher,
            ledger,
        })
    }

    /// The managers' environment over these resources.
    #[must_use]
    pub fn environment(&self) -> TicketingEnvironment {
        TicketingEnvironment::new(
            Arc::clone(&self.clock),
            Arc::clone(&self.store),
            Arc::clone(&self.payments),
        )
        .with_publisher(Arc::clone(&self.publisher))
        .with_ledger(Arc::clone(&self.ledger))
    }
}
