//! Account store module
//!
//! Accounts are created by the registration collaborator and mutated only by
//! the transfer engine through a [`UnitOfWork`].

pub mod db;
pub mod memory;
pub mod models;
pub mod repository;

// Re-export commonly used types
pub use db::PgStore;
pub use memory::MemoryStore;
pub use models::{Account, AccountError, AccountId, AccountKind};
pub use repository::{AccountStore, StoreError, UnitOfWork};
