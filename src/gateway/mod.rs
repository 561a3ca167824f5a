//! HTTP gateway
//!
//! ```text
//! POST /transfer           → move funds
//! GET  /transactions       → ledger listing
//! GET  /accounts/{id}      → account snapshot
//! GET  /health             → liveness
//! ```

pub mod handlers;
pub mod state;
pub mod types;

use std::sync::Arc;

use anyhow::Context;
use axum::{
    Router,
    routing::{get, post},
};
use tokio::net::TcpListener;
use tracing::info;

use crate::config::GatewayConfig;
use state::AppState;

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/transfer", post(handlers::create_transfer))
        .route("/transactions", get(handlers::list_transactions))
        .route("/accounts/{id}", get(handlers::get_account))
        .route("/health", get(handlers::health_check))
        .with_state(state)
}

/// Bind `host:port` and serve until the process is stopped
pub async fn run_server(config: &GatewayConfig, state: Arc<AppState>) -> anyhow::Result<()> {
    let addr = format!("{}:{}", config.host, config.port);
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {} (port already in use?)", addr))?;

    info!(addr = %addr, "Gateway listening");
    axum::serve(listener, router(state))
        .await
        .context("Gateway server error")?;
    Ok(())
}
