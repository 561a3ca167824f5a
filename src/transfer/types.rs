//! Transfer Core Types

use super::error::TransferError;
use crate::account::AccountId;
use crate::ledger::LedgerEntry;
use crate::money::Amount;

/// A transfer request. Ephemeral: validated and consumed, never stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransferRequest {
    pub sender_id: AccountId,
    pub receiver_id: AccountId,
    pub amount: Amount,
}

impl TransferRequest {
    pub fn new(sender_id: AccountId, receiver_id: AccountId, amount: Amount) -> Self {
        Self {
            sender_id,
            receiver_id,
            amount,
        }
    }
}

/// Either the ledger entry of the completed transfer or why it did not happen
pub type TransferResult = Result<LedgerEntry, TransferError>;
