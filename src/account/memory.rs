//! In-memory account store
//!
//! Each account sits behind its own async mutex. A unit of work owns the
//! guards of every account it touches, so conflicting transfers serialize
//! while disjoint ones proceed in parallel.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};

use async_trait::async_trait;
use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::debug;

use super::models::{Account, AccountId, AccountKind};
use super::repository::{AccountStore, StoreError, UnitOfWork, lock_order};
use crate::ledger::{LedgerEntry, MemoryLedger};
use crate::money::Amount;

/// In-memory store backed by per-account locks
pub struct MemoryStore {
    accounts: DashMap<AccountId, Arc<Mutex<Account>>>,
    ledger: Arc<MemoryLedger>,
    next_id: AtomicI64,
}

impl MemoryStore {
    pub fn new(ledger: Arc<MemoryLedger>) -> Self {
        Self {
            accounts: DashMap::new(),
            ledger,
            next_id: AtomicI64::new(1),
        }
    }

    /// Ledger that receives entries staged by this store's units of work
    pub fn ledger(&self) -> &Arc<MemoryLedger> {
        &self.ledger
    }

    /// Insert an account with a caller-chosen id (seeding / fixtures)
    pub fn insert(&self, account: Account) {
        self.next_id.fetch_max(account.id + 1, Ordering::SeqCst);
        self.accounts
            .insert(account.id, Arc::new(Mutex::new(account)));
    }

    fn handle(&self, id: AccountId) -> Option<Arc<Mutex<Account>>> {
        self.accounts.get(&id).map(|entry| entry.value().clone())
    }
}

#[async_trait]
impl AccountStore for MemoryStore {
    async fn find(&self, id: AccountId) -> Result<Option<Account>, StoreError> {
        match self.handle(id) {
            Some(handle) => Ok(Some(handle.lock().await.clone())),
            None => Ok(None),
        }
    }

    async fn create(&self, kind: AccountKind, balance: Amount) -> Result<Account, StoreError> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let account = Account::new(id, kind, balance);
        self.accounts
            .insert(id, Arc::new(Mutex::new(account.clone())));
        Ok(account)
    }

    async fn begin(&self, ids: &[AccountId]) -> Result<Box<dyn UnitOfWork>, StoreError> {
        let ordered = lock_order(ids);

        // Resolve all handles before locking so a missing id fails fast
        let mut handles = Vec::with_capacity(ordered.len());
        for id in &ordered {
            let handle = self.handle(*id).ok_or(StoreError::AccountNotFound(*id))?;
            handles.push((*id, handle));
        }

        let mut guards = HashMap::with_capacity(handles.len());
        for (id, handle) in handles {
            guards.insert(id, handle.lock_owned().await);
        }
        debug!(accounts = ?ordered, "Unit of work opened");

        Ok(Box::new(MemoryUnitOfWork {
            guards,
            staged: HashMap::new(),
            entries: Vec::new(),
            ledger: self.ledger.clone(),
        }))
    }
}

/// Unit of work over locked in-memory accounts
pub struct MemoryUnitOfWork {
    guards: HashMap<AccountId, OwnedMutexGuard<Account>>,
    staged: HashMap<AccountId, Account>,
    entries: Vec<LedgerEntry>,
    ledger: Arc<MemoryLedger>,
}

#[async_trait]
impl UnitOfWork for MemoryUnitOfWork {
    fn load(&self, id: AccountId) -> Result<Account, StoreError> {
        if let Some(account) = self.staged.get(&id) {
            return Ok(account.clone());
        }
        self.guards
            .get(&id)
            .map(|guard| (**guard).clone())
            .ok_or(StoreError::NotLocked(id))
    }

    fn save(&mut self, account: Account) -> Result<(), StoreError> {
        if !self.guards.contains_key(&account.id) {
            return Err(StoreError::NotLocked(account.id));
        }
        self.staged.insert(account.id, account);
        Ok(())
    }

    fn append(
        &mut self,
        sender_id: AccountId,
        receiver_id: AccountId,
        amount: Amount,
    ) -> LedgerEntry {
        let entry = LedgerEntry::new(sender_id, receiver_id, amount);
        self.entries.push(entry.clone());
        entry
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        let MemoryUnitOfWork {
            mut guards,
            staged,
            entries,
            ledger,
        } = *self;

        for (id, account) in staged {
            if let Some(guard) = guards.get_mut(&id) {
                **guard = account;
            }
        }
        // Entries become visible while the account locks are still held
        ledger.append(entries);
        drop(guards);
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<(), StoreError> {
        debug!(staged = self.staged.len(), "Unit of work rolled back");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::Ledger;
    use std::time::Duration;

    fn store_with(accounts: &[(AccountId, AccountKind, u64)]) -> MemoryStore {
        let store = MemoryStore::new(Arc::new(MemoryLedger::new()));
        for (id, kind, units) in accounts {
            store.insert(Account::new(*id, *kind, Amount::units(*units)));
        }
        store
    }

    #[tokio::test]
    async fn test_create_assigns_fresh_ids() {
        let store = store_with(&[(5, AccountKind::Personal, 0)]);
        let created = store
            .create(AccountKind::Merchant, Amount::units(3))
            .await
            .unwrap();
        assert_eq!(created.id, 6);
        assert_eq!(store.find(6).await.unwrap(), Some(created));
        assert_eq!(store.find(42).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_commit_applies_balances_and_entries() {
        let store = store_with(&[(1, AccountKind::Personal, 100), (2, AccountKind::Personal, 10)]);

        let mut uow = store.begin(&[1, 2]).await.unwrap();
        let mut sender = uow.load(1).unwrap();
        let mut receiver = uow.load(2).unwrap();
        sender.debit(Amount::units(40)).unwrap();
        receiver.credit(Amount::units(40)).unwrap();
        uow.save(sender).unwrap();
        uow.save(receiver).unwrap();
        let entry = uow.append(1, 2, Amount::units(40));
        uow.commit().await.unwrap();

        assert_eq!(store.find(1).await.unwrap().unwrap().balance, Amount::units(60));
        assert_eq!(store.find(2).await.unwrap().unwrap().balance, Amount::units(50));
        assert_eq!(store.ledger().list().await.unwrap(), vec![entry]);
    }

    #[tokio::test]
    async fn test_drop_discards_staged_changes() {
        let store = store_with(&[(1, AccountKind::Personal, 100), (2, AccountKind::Personal, 10)]);

        {
            let mut uow = store.begin(&[1, 2]).await.unwrap();
            let mut sender = uow.load(1).unwrap();
            sender.debit(Amount::units(40)).unwrap();
            uow.save(sender).unwrap();
            uow.append(1, 2, Amount::units(40));
            assert_eq!(uow.load(1).unwrap().balance, Amount::units(60));
        }

        assert_eq!(store.find(1).await.unwrap().unwrap().balance, Amount::units(100));
        assert!(store.ledger().is_empty());

        // Locks were released on drop
        let uow = store.begin(&[1, 2]).await.unwrap();
        uow.rollback().await.unwrap();
    }

    #[tokio::test]
    async fn test_begin_rejects_unknown_account() {
        let store = store_with(&[(1, AccountKind::Personal, 100)]);
        let err = store.begin(&[1, 9]).await.err().unwrap();
        assert_eq!(err, StoreError::AccountNotFound(9));
    }

    #[tokio::test]
    async fn test_save_requires_lock() {
        let store = store_with(&[(1, AccountKind::Personal, 1), (2, AccountKind::Personal, 1)]);
        let mut uow = store.begin(&[1]).await.unwrap();
        let outsider = Account::new(2, AccountKind::Personal, Amount::ZERO);
        assert_eq!(uow.save(outsider), Err(StoreError::NotLocked(2)));
        assert_eq!(uow.load(2), Err(StoreError::NotLocked(2)));
    }

    #[tokio::test]
    async fn test_conflicting_unit_of_work_waits() {
        let store = Arc::new(store_with(&[
            (1, AccountKind::Personal, 1),
            (2, AccountKind::Personal, 1),
            (3, AccountKind::Personal, 1),
        ]));

        let held = store.begin(&[1, 2]).await.unwrap();

        // Disjoint accounts are not blocked
        let disjoint = tokio::time::timeout(Duration::from_millis(200), store.begin(&[3]))
            .await
            .expect("disjoint unit of work should not wait");
        assert!(disjoint.is_ok());

        // Overlapping accounts (opposite order) wait for the holder
        let contender = {
            let store = store.clone();
            tokio::spawn(async move { store.begin(&[2, 1]).await.map(|_| ()) })
        };
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!contender.is_finished());

        held.rollback().await.unwrap();
        let joined = tokio::time::timeout(Duration::from_secs(1), contender)
            .await
            .expect("contender should acquire after release")
            .unwrap();
        assert!(joined.is_ok());
    }
}
