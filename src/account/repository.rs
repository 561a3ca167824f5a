//! Account store seams
//!
//! The transfer engine never touches storage directly. It reads through
//! [`AccountStore::find`] and mutates only inside a [`UnitOfWork`], which holds
//! exclusive locks on the accounts it was opened for until it is committed,
//! rolled back or dropped.

use async_trait::async_trait;
use thiserror::Error;

use super::models::{Account, AccountId, AccountKind};
use crate::ledger::LedgerEntry;
use crate::money::Amount;

/// Storage errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("Account not found: {0}")]
    AccountNotFound(AccountId),

    #[error("Account {0} is not part of this unit of work")]
    NotLocked(AccountId),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

impl From<sqlx::Error> for StoreError {
    fn from(e: sqlx::Error) -> Self {
        match e {
            sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
                StoreError::Unavailable(e.to_string())
            }
            _ => StoreError::Database(e.to_string()),
        }
    }
}

/// Account storage
#[async_trait]
pub trait AccountStore: Send + Sync {
    /// Unlocked snapshot read
    async fn find(&self, id: AccountId) -> Result<Option<Account>, StoreError>;

    /// Register a new account (registration collaborator entry point)
    async fn create(&self, kind: AccountKind, balance: Amount) -> Result<Account, StoreError>;

    /// Open an atomic unit of work holding exclusive locks on `ids`.
    ///
    /// Fails with `AccountNotFound` if any id does not exist.
    async fn begin(&self, ids: &[AccountId]) -> Result<Box<dyn UnitOfWork>, StoreError>;
}

/// Explicit begin/commit/rollback scope around balance mutations.
///
/// Changes are staged until `commit`. Dropping without commit is a rollback.
#[async_trait]
pub trait UnitOfWork: Send {
    /// Current (staged) state of a locked account
    fn load(&self, id: AccountId) -> Result<Account, StoreError>;

    /// Stage a new balance for a locked account
    fn save(&mut self, account: Account) -> Result<(), StoreError>;

    /// Stage a ledger entry, written in the same atomic unit as the balances
    fn append(&mut self, sender_id: AccountId, receiver_id: AccountId, amount: Amount)
    -> LedgerEntry;

    async fn commit(self: Box<Self>) -> Result<(), StoreError>;

    async fn rollback(self: Box<Self>) -> Result<(), StoreError>;
}

/// Sort and de-duplicate lock targets so every unit of work acquires locks
/// in the same global order.
pub(crate) fn lock_order(ids: &[AccountId]) -> Vec<AccountId> {
    let mut ordered = ids.to_vec();
    ordered.sort_unstable();
    ordered.dedup();
    ordered
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lock_order_sorted_and_unique() {
        assert_eq!(lock_order(&[7, 3, 7, 1]), vec![1, 3, 7]);
        assert_eq!(lock_order(&[2, 1]), lock_order(&[1, 2]));
    }

    #[test]
    fn test_sqlx_error_mapping() {
        assert!(matches!(
            StoreError::from(sqlx::Error::PoolTimedOut),
            StoreError::Unavailable(_)
        ));
        assert!(matches!(
            StoreError::from(sqlx::Error::RowNotFound),
            StoreError::Database(_)
        ));
    }
}
