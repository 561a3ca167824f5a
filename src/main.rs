//! Peer Transfer - service entry point
//!
//! ```text
//! ┌──────────┐    ┌──────────┐    ┌──────────────┐    ┌────────────┐
//! │ Gateway  │───▶│  Engine  │───▶│ AccountStore │───▶│   Ledger   │
//! │  (HTTP)  │    │          │    │ (Mem / PG)   │    │            │
//! └──────────┘    └────┬─────┘    └──────────────┘    └────────────┘
//!                      │
//!                      ├──▶ Authorizer (HTTP, before commit)
//!                      └──▶ Notifier   (HTTP, fire-and-forget)
//! ```

use std::sync::Arc;

use anyhow::Context;
use tracing::{info, warn};

use peer_transfer::account::{Account, AccountStore, MemoryStore, PgStore};
use peer_transfer::config::AppConfig;
use peer_transfer::external::{HttpAuthorizer, HttpNotifier};
use peer_transfer::gateway::{self, state::AppState};
use peer_transfer::ledger::{Ledger, MemoryLedger};
use peer_transfer::transfer::{EngineSettings, TransferEngine};

// ============================================================
// ARGS
// ============================================================

fn get_env() -> String {
    let args: Vec<String> = std::env::args().collect();
    for i in 0..args.len() {
        if (args[i] == "--env" || args[i] == "-e") && i + 1 < args.len() {
            return args[i + 1].clone();
        }
    }
    "dev".to_string()
}

fn get_port_override() -> Option<u16> {
    let args: Vec<String> = std::env::args().collect();
    for i in 0..args.len() {
        if args[i] == "--port" && i + 1 < args.len() {
            return args[i + 1].parse().ok();
        }
    }
    None
}

// ============================================================
// STORAGE
// ============================================================

async fn open_storage(
    config: &AppConfig,
) -> anyhow::Result<(Arc<dyn AccountStore>, Arc<dyn Ledger>)> {
    if let Some(url) = &config.postgres_url {
        let store = Arc::new(
            PgStore::connect(url)
                .await
                .context("Failed to connect to PostgreSQL")?,
        );
        store
            .ensure_schema()
            .await
            .context("Failed to initialize schema")?;
        if !config.seed_accounts.is_empty() {
            warn!(
                count = config.seed_accounts.len(),
                "seed_accounts ignored with PostgreSQL storage"
            );
        }
        info!("Using PostgreSQL account store");
        let accounts: Arc<dyn AccountStore> = store.clone();
        let ledger: Arc<dyn Ledger> = store;
        return Ok((accounts, ledger));
    }

    let ledger = Arc::new(MemoryLedger::new());
    let store = Arc::new(MemoryStore::new(ledger.clone()));
    for seed in &config.seed_accounts {
        store.insert(Account::new(seed.id, seed.kind, seed.balance));
    }
    info!(accounts = config.seed_accounts.len(), "Using in-memory account store");
    let accounts: Arc<dyn AccountStore> = store;
    let ledger: Arc<dyn Ledger> = ledger;
    Ok((accounts, ledger))
}

// ============================================================
// MAIN
// ============================================================

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let env = get_env();
    let mut config = AppConfig::load(&env)?;
    if let Some(port) = get_port_override() {
        config.gateway.port = port;
    }
    let _log_guard = peer_transfer::logging::init_logging(&config)?;

    info!(env = %env, "Starting peer transfer service");

    let (store, ledger) = open_storage(&config).await?;

    let authorizer = Arc::new(
        HttpAuthorizer::new(&config.authorizer).context("Failed to build authorizer client")?,
    );
    let notifier =
        Arc::new(HttpNotifier::new(&config.notifier).context("Failed to build notifier client")?);

    let engine = Arc::new(TransferEngine::new(
        store.clone(),
        ledger,
        authorizer,
        notifier,
        EngineSettings::from_config(&config),
    ));
    info!(
        authorizer = %config.authorizer.url,
        notifier = %config.notifier.url,
        policy = ?config.transfer.authorization,
        "Transfer engine ready"
    );

    let state = Arc::new(AppState::new(engine, store));
    gateway::run_server(&config.gateway, state).await
}
