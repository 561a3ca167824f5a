//! PostgreSQL account store
//!
//! A unit of work is a database transaction. Rows are locked with
//! `SELECT ... FOR UPDATE` in ascending id order; the transaction is rolled
//! back by sqlx when dropped without commit.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use sqlx::{Postgres, Row, Transaction};
use tracing::{debug, info};

use super::models::{Account, AccountId, AccountKind};
use super::repository::{AccountStore, StoreError, UnitOfWork, lock_order};
use crate::ledger::{Ledger, LedgerEntry};
use crate::money::Amount;

const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS accounts_tb (
        id BIGSERIAL PRIMARY KEY,
        kind SMALLINT NOT NULL,
        balance NUMERIC(20, 2) NOT NULL CHECK (balance >= 0),
        created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
        updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS ledger_entries_tb (
        entry_id VARCHAR(26) PRIMARY KEY,
        sender_id BIGINT NOT NULL REFERENCES accounts_tb(id),
        receiver_id BIGINT NOT NULL REFERENCES accounts_tb(id),
        amount NUMERIC(20, 2) NOT NULL CHECK (amount > 0),
        created_at TIMESTAMPTZ NOT NULL,
        seq BIGSERIAL NOT NULL
    )
    "#,
    // Tables created before `seq` existed
    r#"
    ALTER TABLE ledger_entries_tb ADD COLUMN IF NOT EXISTS seq BIGSERIAL NOT NULL
    "#,
];

/// PostgreSQL-backed account store and ledger
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    /// Create a connection pool and wrap it
    pub async fn connect(database_url: &str) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .acquire_timeout(Duration::from_secs(5))
            .connect(database_url)
            .await?;

        info!("PostgreSQL connection pool established");
        Ok(Self { pool })
    }

    /// Create tables if missing
    pub async fn ensure_schema(&self) -> Result<(), StoreError> {
        for statement in SCHEMA {
            sqlx::query(statement).execute(&self.pool).await?;
        }
        Ok(())
    }
}

fn row_to_account(row: &PgRow) -> Result<Account, StoreError> {
    let id: i64 = row.try_get("id")?;
    let kind_id: i16 = row.try_get("kind")?;
    let balance: Decimal = row.try_get("balance")?;

    let kind = AccountKind::from_id(kind_id)
        .ok_or_else(|| StoreError::Database(format!("Unknown account kind {}", kind_id)))?;
    let balance = Amount::from_decimal(balance)
        .map_err(|e| StoreError::Database(format!("Invalid balance on account {}: {}", id, e)))?;

    Ok(Account::new(id, kind, balance))
}

fn row_to_entry(row: &PgRow) -> Result<LedgerEntry, StoreError> {
    let entry_id: String = row.try_get("entry_id")?;
    let amount: Decimal = row.try_get("amount")?;
    let created_at: DateTime<Utc> = row.try_get("created_at")?;

    Ok(LedgerEntry {
        id: entry_id
            .parse()
            .map_err(|e| StoreError::Database(format!("Invalid entry id {}: {}", entry_id, e)))?,
        sender_id: row.try_get("sender_id")?,
        receiver_id: row.try_get("receiver_id")?,
        amount: Amount::from_decimal(amount)
            .map_err(|e| StoreError::Database(format!("Invalid amount: {}", e)))?,
        created_at,
    })
}

async fn insert_entry<'e, E>(executor: E, entry: &LedgerEntry) -> Result<(), StoreError>
where
    E: sqlx::Executor<'e, Database = Postgres>,
{
    sqlx::query(
        r#"
        INSERT INTO ledger_entries_tb (entry_id, sender_id, receiver_id, amount, created_at)
        VALUES ($1, $2, $3, $4, $5)
        "#,
    )
    .bind(entry.id.to_string())
    .bind(entry.sender_id)
    .bind(entry.receiver_id)
    .bind(entry.amount.to_decimal())
    .bind(entry.created_at)
    .execute(executor)
    .await?;
    Ok(())
}

#[async_trait]
impl AccountStore for PgStore {
    async fn find(&self, id: AccountId) -> Result<Option<Account>, StoreError> {
        let row = sqlx::query("SELECT id, kind, balance FROM accounts_tb WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(row_to_account).transpose()
    }

    async fn create(&self, kind: AccountKind, balance: Amount) -> Result<Account, StoreError> {
        let row = sqlx::query(
            r#"
            INSERT INTO accounts_tb (kind, balance)
            VALUES ($1, $2)
            RETURNING id, kind, balance
            "#,
        )
        .bind(kind.id())
        .bind(balance.to_decimal())
        .fetch_one(&self.pool)
        .await?;

        row_to_account(&row)
    }

    async fn begin(&self, ids: &[AccountId]) -> Result<Box<dyn UnitOfWork>, StoreError> {
        let ordered = lock_order(ids);
        let mut tx = self.pool.begin().await?;

        let rows = sqlx::query(
            r#"
            SELECT id, kind, balance FROM accounts_tb
            WHERE id = ANY($1)
            ORDER BY id
            FOR UPDATE
            "#,
        )
        .bind(&ordered[..])
        .fetch_all(&mut *tx)
        .await?;

        let mut locked = HashMap::with_capacity(rows.len());
        for row in &rows {
            let account = row_to_account(row)?;
            locked.insert(account.id, account);
        }

        if let Some(missing) = ordered.iter().find(|id| !locked.contains_key(*id)) {
            // tx dropped here -> ROLLBACK
            return Err(StoreError::AccountNotFound(*missing));
        }
        debug!(accounts = ?ordered, "Row locks acquired");

        Ok(Box::new(PgUnitOfWork {
            tx,
            locked,
            staged: HashMap::new(),
            entries: Vec::new(),
        }))
    }
}

#[async_trait]
impl Ledger for PgStore {
    async fn record(
        &self,
        sender_id: AccountId,
        receiver_id: AccountId,
        amount: Amount,
    ) -> Result<LedgerEntry, StoreError> {
        let entry = LedgerEntry::new(sender_id, receiver_id, amount);
        insert_entry(&self.pool, &entry).await?;
        Ok(entry)
    }

    async fn list(&self) -> Result<Vec<LedgerEntry>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT entry_id, sender_id, receiver_id, amount, created_at
            FROM ledger_entries_tb
            ORDER BY seq
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_entry).collect()
    }
}

/// Unit of work backed by an open PostgreSQL transaction
pub struct PgUnitOfWork {
    tx: Transaction<'static, Postgres>,
    locked: HashMap<AccountId, Account>,
    staged: HashMap<AccountId, Account>,
    entries: Vec<LedgerEntry>,
}

#[async_trait]
impl UnitOfWork for PgUnitOfWork {
    fn load(&self, id: AccountId) -> Result<Account, StoreError> {
        self.staged
            .get(&id)
            .or_else(|| self.locked.get(&id))
            .cloned()
            .ok_or(StoreError::NotLocked(id))
    }

    fn save(&mut self, account: Account) -> Result<(), StoreError> {
        if !self.locked.contains_key(&account.id) {
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
        let PgUnitOfWork {
            mut tx,
            staged,
            entries,
            ..
        } = *self;

        for account in staged.values() {
            sqlx::query(
                r#"
                UPDATE accounts_tb
                SET balance = $1, updated_at = NOW()
                WHERE id = $2
                "#,
            )
            .bind(account.balance.to_decimal())
            .bind(account.id)
            .execute(&mut *tx)
            .await?;
        }

        for entry in &entries {
            insert_entry(&mut *tx, entry).await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<(), StoreError> {
        self.tx.rollback().await?;
        Ok(())
    }
}
