//! Ticketing server.
//!
//! Serves the seat map, selection, checkout, resale and check-in endpoints and
//! runs the hold expiry sweeper until SIGINT/SIGTERM.
//!
//! # Usage
//!
//! ```bash
//! # Start PostgreSQL
//! docker compose up -d
//!
//! # Run server
//! cargo run --bin server
//! ```

use ticketing::{ApplicationBuilder, Config};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Missing .env is fine, the environment may already be populated
    let _ = dotenvy::dotenv();

    ApplicationBuilder::new()
        .with_config(Config::from_env())
        .with_tracing()?
        .with_metrics()?
        .with_resources()
        .await?
        .build()
        .await?
        .run()
        .await
}
