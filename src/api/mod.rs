//! REST API over the ledger.
//!
//! Handlers are thin: they parse the request into the typed forms of
//! [`crate::core`], call one core operation, and wrap the result in the shared
//! response envelope. Errors map to status codes in [`models::ApiError`].

/// Request handlers
pub mod handlers;
/// Request and response bodies
pub mod models;

use crate::config::LedgerConfig;
use axum::{Router, routing::get};
use sea_orm::DatabaseConnection;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool
    pub db: Arc<DatabaseConnection>,
    /// Option lists injected into validation
    pub ledger: Arc<LedgerConfig>,
}

impl AppState {
    /// Builds the state from a connection and ledger options.
    #[must_use]
    pub fn new(db: DatabaseConnection, ledger: LedgerConfig) -> Self {
        Self {
            db: Arc::new(db),
            ledger: Arc::new(ledger),
        }
    }
}

/// Creates the API router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health_handler))
        .route(
            "/api/settlements",
            get(handlers::list_settlements).post(handlers::create_settlement),
        )
        .route(
            "/api/settlements/:id",
            get(handlers::get_settlement)
                .put(handlers::update_settlement)
                .delete(handlers::delete_settlement),
        )
        .route(
            "/api/transactions",
            get(handlers::list_transactions).post(handlers::create_transaction),
        )
        .route(
            "/api/transactions/available",
            get(handlers::available_transactions),
        )
        .route("/api/transactions/:id", get(handlers::get_transaction))
        .route(
            "/api/bank-accounts",
            get(handlers::list_bank_accounts).post(handlers::create_bank_account),
        )
        .route("/api/bank-accounts/:id", get(handlers::get_bank_account))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
