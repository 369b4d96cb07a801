//! Declarative application builder API.
//!
//! Initialization follows a step-by-step pattern:
//! 1. Configure (config, tracing, metrics)
//! 2. Initialize infrastructure (database, payment provider, collaborators)
//! 3. Build HTTP server (managers, state, routes) and the expiry sweeper
//! 4. Run application (sweeper, server, graceful shutdown)
//!
//! Each step returns `Result`, so a failing step stops startup with context.
//!
//! # Example
//!
//! ```rust,ignore
//! ApplicationBuilder::new()
//!     .with_config(Config::from_env())
//!     .with_tracing()?
//!     .with_metrics()?
//!     .with_resources().await?
//!     .build().await?
//!     .run().await?;
//! ```

use crate::app::{CheckoutSettings, Ticketing};
use crate::bootstrap::ResourceManager;
use crate::config::Config;
use crate::metrics::register_business_metrics;
use crate::runtime::{Application, ExpirySweeper};
use crate::server::{AppState, build_router};
use anyhow::{Context, anyhow};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::info;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Default log filter when `RUST_LOG` is not set.
pub const DEFAULT_LOG_FILTER: &str = "info,ticketing=debug,sqlx=warn";

/// Builder for creating a fully configured ticketing application.
///
/// Option fields track which steps have run; `build` checks them.
pub struct ApplicationBuilder {
    /// Application configuration
    config: Option<Arc<Config>>,

    /// Infrastructure resources
    resources: Option<ResourceManager>,

    /// Shutdown signal broadcaster
    shutdown_tx: broadcast::Sender<()>,
}

impl ApplicationBuilder {
    /// Create a new application builder.
    #[must_use]
    pub fn new() -> Self {
        let (shutdown_tx, _) = broadcast::channel(16);
        Self {
            config: None,
            resources: None,
            shutdown_tx,
        }
    }

    /// Set application configuration. Call first.
    #[must_use]
    pub fn with_config(mut self, config: Config) -> Self {
        self.config = Some(Arc::new(config));
        self
    }

    /// Setup tracing and logging.
    ///
    /// Uses `RUST_LOG` when set, otherwise [`DEFAULT_LOG_FILTER`].
    ///
    /// # Errors
    ///
    /// Returns error if a global subscriber is already installed.
    pub fn with_tracing(self) -> anyhow::Result<Self> {
        tracing_subscriber::registry()
            .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER)))
            .with(tracing_subscriber::fmt::layer())
            .try_init()
            .context("installing tracing subscriber")?;

        Ok(self)
    }

    /// Install the Prometheus exporter on the metrics address.
    ///
    /// # Errors
    ///
    /// Returns error if config is missing, the address is invalid, or the
    /// exporter cannot be installed.
    pub fn with_metrics(self) -> anyhow::Result<Self> {
        let config = self
            .config
            .as_ref()
            .ok_or_else(|| anyhow!("Config must be set before installing metrics"))?;
        let address: SocketAddr = config
            .metrics_address()
            .parse()
            .with_context(|| format!("invalid metrics address {}", config.metrics_address()))?;

        PrometheusBuilder::new()
            .set_buckets_for_metric(
                Matcher::Suffix("duration_seconds".to_string()),
                &[0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0],
            )
            .context("configuring histogram buckets")?
            .with_http_listener(address)
            .install()
            .context("installing Prometheus exporter")?;
        register_business_metrics();
        info!(address = %address, "Metrics exporter listening");

        Ok(self)
    }

    /// Initialize infrastructure resources.
    ///
    /// # Errors
    ///
    /// Returns error if config is missing or the database is unreachable.
    pub async fn with_resources(mut self) -> anyhow::Result<Self> {
        let config = self
            .config
            .as_ref()
            .ok_or_else(|| anyhow!("Config must be set before initializing resources"))?;

        self.resources = Some(ResourceManager::from_config(config.as_ref()).await?);
        Ok(self)
    }

    /// Build the complete application.
    ///
    /// # Errors
    ///
    /// Returns error if a step was skipped or the HTTP listener cannot bind.
    pub async fn build(self) -> anyhow::Result<Application> {
        let config = self.config.ok_or_else(|| anyhow!("Config must be set"))?;
        let resources = self.resources.ok_or_else(|| anyhow!("Resources must be initialized"))?;

        let ticketing = Ticketing::new(
            resources.environment(),
            config.reservation.clone(),
            CheckoutSettings::from_config(&config.payment),
        );
        let sweeper = ExpirySweeper::new(ticketing.reservations.clone(), config.reservation.sweep_interval());

        let router = build_router(AppState::new(ticketing, resources.store.clone()));

        let address = config.server_address();
        let listener = tokio::net::TcpListener::bind(&address)
            .await
            .with_context(|| format!("binding {address}"))?;

        Ok(Application::new(listener, router, sweeper, self.shutdown_tx, config))
    }
}

impl Default for ApplicationBuilder {
    fn default() -> Self {
        Self::new()
    }
}
