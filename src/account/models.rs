//! Data models for transfer accounts

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::money::Amount;

/// Account identifier (PostgreSQL BIGSERIAL)
pub type AccountId = i64;

/// Account kind
///
/// Merchants are receive-only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[repr(i16)]
pub enum AccountKind {
    #[serde(alias = "user")]
    Personal = 1,
    Merchant = 2,
}

impl AccountKind {
    /// Get numeric ID for PostgreSQL storage
    #[inline]
    pub fn id(&self) -> i16 {
        *self as i16
    }

    /// Convert from PostgreSQL ID
    pub fn from_id(id: i16) -> Option<Self> {
        match id {
            1 => Some(AccountKind::Personal),
            2 => Some(AccountKind::Merchant),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AccountKind::Personal => "personal",
            AccountKind::Merchant => "merchant",
        }
    }

    #[inline]
    pub fn can_send(&self) -> bool {
        matches!(self, AccountKind::Personal)
    }
}

impl fmt::Display for AccountKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AccountKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "personal" | "user" => Ok(AccountKind::Personal),
            "merchant" => Ok(AccountKind::Merchant),
            other => Err(format!(
                "Invalid account kind: {}. Use 'personal' or 'merchant'",
                other
            )),
        }
    }
}

/// Balance mutation errors
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AccountError {
    #[error("Insufficient balance: account {account_id} has {available}, needs {required}")]
    InsufficientBalance {
        account_id: AccountId,
        available: Amount,
        required: Amount,
    },

    #[error("Balance overflow on account {0}")]
    Overflow(AccountId),
}

/// A user's holding of funds
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Account {
    pub id: AccountId,
    pub kind: AccountKind,
    pub balance: Amount,
}

impl Account {
    pub fn new(id: AccountId, kind: AccountKind, balance: Amount) -> Self {
        Self { id, kind, balance }
    }

    /// Debit the balance. Never goes below zero.
    pub fn debit(&mut self, amount: Amount) -> Result<(), AccountError> {
        self.balance =
            self.balance
                .checked_sub(amount)
                .ok_or(AccountError::InsufficientBalance {
                    account_id: self.id,
                    available: self.balance,
                    required: amount,
                })?;
        Ok(())
    }

    pub fn credit(&mut self, amount: Amount) -> Result<(), AccountError> {
        self.balance = self
            .balance
            .checked_add(amount)
            .ok_or(AccountError::Overflow(self.id))?;
        Ok(())
    }
}
