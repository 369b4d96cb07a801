//! Application state for the ticketing HTTP server.

use crate::app::Ticketing;
use axum::extract::FromRef;
use boxoffice_core::store::InventoryStore;
use std::sync::Arc;

/// Application state shared across all HTTP handlers.
///
/// Cloned per request; everything inside is behind `Arc`.
#[derive(Clone)]
pub struct AppState {
    /// Seat, checkout, resale and check-in managers
    pub ticketing: Arc<Ticketing>,

    /// Inventory store, probed by the readiness check
    pub inventory_store: Arc<dyn InventoryStore>,
}

impl AppState {
    /// Create a new application state.
    #[must_use]
    pub fn new(ticketing: Ticketing, inventory_store: Arc<dyn InventoryStore>) -> Self {
        Self {
            ticketing: Arc::new(ticketing),
            inventory_store,
        }
    }
}

// Lets the web crate's readiness handler extract the store from AppState
impl FromRef<AppState> for Arc<dyn InventoryStore> {
    fn from_ref(app_state: &AppState) -> Self {
        app_state.inventory_store.clone()
    }
}
