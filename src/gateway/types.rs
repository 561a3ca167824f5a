use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};

use crate::account::AccountId;
use crate::ledger::LedgerEntry;
use crate::money::{Amount, MoneyError};
use crate::transfer::{TransferError, TransferRequest};

// ============================================================================
// Requests
// ============================================================================

/// Raw `POST /transfer` body. The amount is kept untyped so that bad amounts
/// can be told apart from malformed JSON.
#[derive(Debug, Deserialize)]
pub struct TransferBody {
    pub sender_id: AccountId,
    pub receiver_id: AccountId,
    pub amount: serde_json::Value,
}

impl TransferBody {
    pub fn into_request(self) -> Result<TransferRequest, TransferError> {
        let text = match self.amount {
            serde_json::Value::String(s) => s,
            serde_json::Value::Number(n) => n.to_string(),
            other => {
                return Err(TransferError::Validation(format!(
                    "amount must be a string or number, got {}",
                    other
                )));
            }
        };

        let amount: Amount = text.parse().map_err(|e| match e {
            MoneyError::InvalidAmount | MoneyError::PrecisionOverflow { .. } => {
                TransferError::InvalidAmount
            }
            other => TransferError::Validation(other.to_string()),
        })?;

        Ok(TransferRequest::new(self.sender_id, self.receiver_id, amount))
    }
}

// ============================================================================
// Responses
// ============================================================================

#[derive(Debug, Serialize)]
pub struct TransferResponse {
    pub message: &'static str,
    pub transaction: LedgerEntry,
}

impl TransferResponse {
    pub fn success(transaction: LedgerEntry) -> Self {
        Self {
            message: "Transfer successful",
            transaction,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    /// Server timestamp in milliseconds
    pub timestamp_ms: i64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
    pub code: String,
}

/// Error leaving the HTTP boundary: `{"error": ..., "code": ...}`
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub code: &'static str,
    pub message: String,
}

impl ApiError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            code: "VALIDATION_ERROR",
            message: message.into(),
        }
    }
}

impl From<TransferError> for ApiError {
    fn from(e: TransferError) -> Self {
        Self {
            status: StatusCode::from_u16(e.http_status())
                .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
            code: e.code(),
            message: e.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: self.message,
            code: self.code.to_string(),
        };
        (self.status, Json(body)).into_response()
    }
}

pub type ApiResult<T> = Result<Json<T>, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn body(amount: serde_json::Value) -> TransferBody {
        TransferBody {
            sender_id: 1,
            receiver_id: 2,
            amount,
        }
    }

    #[test]
    fn test_amount_forms() {
        let expected = TransferRequest::new(1, 2, Amount::from_minor(4050));
        assert_eq!(body(json!("40.50")).into_request().unwrap(), expected);
        assert_eq!(body(json!(40.5)).into_request().unwrap(), expected);
        assert_eq!(
            body(json!(40)).into_request().unwrap().amount,
            Amount::units(40)
        );
    }

    #[test]
    fn test_numeric_amount_keeps_source_digits() {
        let parsed: TransferBody = serde_json::from_str(
            r#"{"sender_id": 1, "receiver_id": 2, "amount": 90071992547409.93}"#,
        )
        .unwrap();
        let req = parsed.into_request().unwrap();
        assert_eq!(req.amount, Amount::from_minor(9_007_199_254_740_993));
        assert_eq!(req.amount.to_string(), "90071992547409.93");
    }

    #[test]
    fn test_bad_amounts() {
        for bad in [json!("0"), json!(-5), json!("-1.00"), json!("1.001")] {
            assert_eq!(
                body(bad.clone()).into_request().unwrap_err(),
                TransferError::InvalidAmount,
                "amount {}",
                bad
            );
        }
        for malformed in [json!("abc"), json!(null), json!(true), json!(".5")] {
            assert!(matches!(
                body(malformed).into_request().unwrap_err(),
                TransferError::Validation(_)
            ));
        }
    }

    #[test]
    fn test_api_error_from_transfer_error() {
        let err = ApiError::from(TransferError::AccountNotFound(5));
        assert_eq!(err.status, StatusCode::NOT_FOUND);
        assert_eq!(err.code, "ACCOUNT_NOT_FOUND");

        let err = ApiError::from(TransferError::AuthorizerUnavailable("timeout".into()));
        assert_eq!(err.status, StatusCode::BAD_GATEWAY);
    }
}
