//! Application lifecycle management and graceful shutdown.
//!
//! The `Application` struct owns the HTTP listener, the router and the
//! background tasks:
//!
//! 1. **Startup**: Spawn the hold expiry sweeper
//! 2. **Runtime**: Serve HTTP
//! 3. **Shutdown**: On Ctrl+C or SIGTERM stop accepting connections, signal the
//!    sweeper and wait for it (bounded by the configured shutdown timeout)
//!
//! # Example
//!
//! ```rust,ignore
//! let app = ApplicationBuilder::new()
//!     .with_config(config)
//!     .with_resources().await?
//!     .build().await?;
//!
//! app.run().await?;
//! ```

use crate::config::Config;
use crate::runtime::ExpirySweeper;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::{error, info, warn};

/// Running application with all background tasks.
pub struct Application {
    /// TCP listener for HTTP server
    listener: tokio::net::TcpListener,

    /// Axum router with all HTTP routes
    app: axum::Router,

    /// Hold expiry sweeper
    sweeper: ExpirySweeper,

    /// Shutdown signal broadcaster
    shutdown_tx: broadcast::Sender<()>,

    /// Application configuration
    config: Arc<Config>,
}

impl Application {
    /// Create a new application instance.
    #[must_use]
    pub fn new(
        listener: tokio::net::TcpListener,
        app: axum::Router,
        sweeper: ExpirySweeper,
        shutdown_tx: broadcast::Sender<()>,
        config: Arc<Config>,
    ) -> Self {
        Self {
            listener,
            app,
            sweeper,
            shutdown_tx,
            config,
        }
    }

    /// Run the application until a shutdown signal is received.
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP server fails.
    pub async fn run(self) -> anyhow::Result<()> {
        info!(address = %self.config.server_address(), "Starting HTTP server");

        let sweeper_handle = self.sweeper.spawn(self.shutdown_tx.subscribe());

        info!("HTTP server listening for requests");
        axum::serve(self.listener, self.app)
            .with_graceful_shutdown(shutdown_signal())
            .await?;

        info!("HTTP server stopped, initiating graceful shutdown...");

        // No receivers left means the sweeper already exited
        let _ = self.shutdown_tx.send(());

        let timeout = Duration::from_secs(self.config.server.shutdown_timeout);
        match tokio::time::timeout(timeout, sweeper_handle).await {
            Ok(Ok(())) => info!("Sweeper stopped gracefully"),
            Ok(Err(e)) => warn!(error = %e, "Sweeper task failed"),
            Err(_) => warn!("Sweeper shutdown timed out"),
        }

        info!("Graceful shutdown complete");
        Ok(())
    }
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM).
///
/// If a handler cannot be installed that source is ignored and the other
/// one still works.
async fn shutdown_signal() {
    use tokio::signal;

    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            info!("Received Ctrl+C signal");
        }
        () = terminate => {
            info!("Received SIGTERM signal");
        }
    }
}
