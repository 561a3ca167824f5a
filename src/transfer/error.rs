//! Transfer Error Types
//!
//! Every failure kind has a stable machine code and a fixed HTTP status.

use thiserror::Error;

use crate::account::{AccountId, StoreError};

/// Transfer error types
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransferError {
    // === Validation Errors ===
    #[error("Invalid request: {0}")]
    Validation(String),

    #[error("Account not found: {0}")]
    AccountNotFound(AccountId),

    #[error("Amount must be greater than zero")]
    InvalidAmount,

    #[error("Sender and receiver must be different accounts")]
    InvalidTransfer,

    // === Business Rule Errors ===
    #[error("Merchants cannot send money")]
    MerchantCannotSend,

    #[error("Insufficient balance")]
    InsufficientBalance,

    #[error("Transfer not authorized")]
    NotAuthorized,

    // === System Errors ===
    #[error("Transfer failed and was rolled back: {0}")]
    PersistenceFailure(String),

    #[error("Authorization service unavailable: {0}")]
    AuthorizerUnavailable(String),

    #[error("Compensation failed, manual reconciliation required: {0}")]
    CompensationFailure(String),
}

impl TransferError {
    /// Get the error code for API responses
    pub fn code(&self) -> &'static str {
        match self {
            TransferError::Validation(_) => "VALIDATION_ERROR",
            TransferError::AccountNotFound(_) => "ACCOUNT_NOT_FOUND",
            TransferError::InvalidAmount => "INVALID_AMOUNT",
            TransferError::InvalidTransfer => "INVALID_TRANSFER",
            TransferError::MerchantCannotSend => "MERCHANT_CANNOT_SEND",
            TransferError::InsufficientBalance => "INSUFFICIENT_BALANCE",
            TransferError::NotAuthorized => "NOT_AUTHORIZED",
            TransferError::PersistenceFailure(_) => "PERSISTENCE_FAILURE",
            TransferError::AuthorizerUnavailable(_) => "AUTHORIZER_UNAVAILABLE",
            TransferError::CompensationFailure(_) => "COMPENSATION_FAILURE",
        }
    }

    /// Get HTTP status code
    pub fn http_status(&self) -> u16 {
        match self {
            TransferError::Validation(_)
            | TransferError::InvalidAmount
            | TransferError::InvalidTransfer
            | TransferError::MerchantCannotSend
            | TransferError::InsufficientBalance
            | TransferError::NotAuthorized => 400,
            TransferError::AccountNotFound(_) => 404,
            TransferError::PersistenceFailure(_) | TransferError::CompensationFailure(_) => 500,
            TransferError::AuthorizerUnavailable(_) => 502,
        }
    }

    /// Balances and ledger were left untouched by this failure
    pub fn is_clean(&self) -> bool {
        !matches!(self, TransferError::CompensationFailure(_))
    }
}

impl From<StoreError> for TransferError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::AccountNotFound(id) => TransferError::AccountNotFound(id),
            other => TransferError::PersistenceFailure(other.to_string()),
        }
    }
}
