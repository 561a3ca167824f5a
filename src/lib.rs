//! Peer Transfer - peer-to-peer money transfer service
//!
//! Moves funds between user accounts with an external authorization gate,
//! an append-only ledger and best-effort receiver notification.
//!
//! # Modules
//!
//! - [`money`] - Fixed-point amounts (minor units)
//! - [`account`] - Accounts, account stores and units of work
//! - [`ledger`] - Append-only transfer records
//! - [`external`] - Authorizer / notifier clients
//! - [`transfer`] - Transfer engine
//! - [`gateway`] - HTTP surface
//! - [`config`] - YAML configuration
//! - [`logging`] - Tracing setup

pub mod account;
pub mod config;
pub mod external;
pub mod gateway;
pub mod ledger;
pub mod logging;
pub mod money;
pub mod transfer;

// Convenient re-exports at crate root
pub use account::{Account, AccountId, AccountKind, AccountStore, MemoryStore, PgStore};
pub use config::AppConfig;
pub use ledger::{Ledger, LedgerEntry, MemoryLedger};
pub use money::Amount;
pub use transfer::{EngineSettings, TransferEngine, TransferError, TransferRequest};
