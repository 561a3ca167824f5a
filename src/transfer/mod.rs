//! Peer-to-peer transfers
//!
//! # Flow
//!
//! ```text
//! validate → authorize → lock(sender, receiver) → debit/credit + ledger entry → commit → notify
//!    ↓           ↓                  ↓                        ↓
//!  reject    NotAuthorized   InsufficientBalance     PersistenceFailure
//! ```
//!
//! # Safety Invariants
//!
//! 1. **Atomicity**: debit, credit and ledger entry commit together or not at all
//! 2. **Per-account serialization**: a unit of work locks both accounts in id order
//! 3. **Clean failures**: every error except `CompensationFailure` leaves state untouched
//! 4. **Best-effort notification**: runs after the response is decided

pub mod engine;
pub mod error;
pub mod types;


pub use engine::{EngineSettings, TransferEngine};
pub use error::TransferError;
pub use types::{TransferRequest, TransferResult};
