//! Ledger - append-only record of completed transfers
//!
//! An entry exists only for a transfer whose balance mutations were committed
//! and authorized. Entries are never mutated or deleted.

use std::sync::{PoisonError, RwLock};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::account::{AccountId, StoreError};
use crate::money::Amount;

/// Ledger entry identifier - ULID, sortable by creation time
pub type LedgerEntryId = ulid::Ulid;

/// Immutable record of one completed transfer
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LedgerEntry {
    pub id: LedgerEntryId,
    pub sender_id: AccountId,
    pub receiver_id: AccountId,
    pub amount: Amount,
    pub created_at: DateTime<Utc>,
}

impl LedgerEntry {
    pub fn new(sender_id: AccountId, receiver_id: AccountId, amount: Amount) -> Self {
        Self {
            id: ulid::Ulid::new(),
            sender_id,
            receiver_id,
            amount,
            created_at: Utc::now(),
        }
    }
}

/// Append-only ledger
#[async_trait]
pub trait Ledger: Send + Sync {
    /// Append an entry for a transfer whose balances are already committed.
    async fn record(
        &self,
        sender_id: AccountId,
        receiver_id: AccountId,
        amount: Amount,
    ) -> Result<LedgerEntry, StoreError>;

    /// All entries in creation order.
    async fn list(&self) -> Result<Vec<LedgerEntry>, StoreError>;
}

/// In-memory ledger
#[derive(Debug, Default)]
pub struct MemoryLedger {
    entries: RwLock<Vec<LedgerEntry>>,
}

impl MemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append already-built entries (used by the memory store on commit)
    pub(crate) fn append(&self, entries: Vec<LedgerEntry>) {
        if entries.is_empty() {
            return;
        }
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .extend(entries);
    }

    pub fn len(&self) -> usize {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl Ledger for MemoryLedger {
    async fn record(
        &self,
        sender_id: AccountId,
        receiver_id: AccountId,
        amount: Amount,
    ) -> Result<LedgerEntry, StoreError> {
        let entry = LedgerEntry::new(sender_id, receiver_id, amount);
        self.append(vec![entry.clone()]);
        Ok(entry)
    }

    async fn list(&self) -> Result<Vec<LedgerEntry>, StoreError> {
        Ok(self
            .entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_record_appends_in_order() {
        let ledger = MemoryLedger::new();
        assert!(ledger.is_empty());

        let first = ledger.record(1, 2, Amount::units(40)).await.unwrap();
        let second = ledger.record(2, 1, Amount::units(5)).await.unwrap();

        let entries = ledger.list().await.unwrap();
        assert_eq!(entries, vec![first.clone(), second]);
        assert_eq!(first.sender_id, 1);
        assert_eq!(first.receiver_id, 2);
        assert_eq!(first.amount, Amount::units(40));
    }

    #[tokio::test]
    async fn test_list_is_idempotent() {
        let ledger = MemoryLedger::new();
        ledger.record(1, 2, Amount::units(1)).await.unwrap();

        let a = ledger.list().await.unwrap();
        let b = ledger.list().await.unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_entry_serializes_amount_as_string() {
        let entry = LedgerEntry::new(1, 2, Amount::from_minor(4050));
        let json = serde_json::to_value(&entry).unwrap();
        assert_eq!(json["amount"], "40.50");
        assert_eq!(json["sender_id"], 1);
        assert_eq!(json["id"], entry.id.to_string());
    }
}
