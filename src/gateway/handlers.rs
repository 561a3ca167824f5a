use std::sync::Arc;

use axum::{
    Json,
    body::Body,
    extract::{FromRequest, Path, Request, State},
};
use tracing::{info, warn};

use crate::account::{Account, AccountId, AccountStore};
use crate::ledger::LedgerEntry;
use crate::transfer::{TransferError, TransferRequest};

use super::state::AppState;
use super::types::{ApiError, ApiResult, HealthResponse, TransferBody, TransferResponse};

/// Parses and validates a transfer body before the handler runs
#[derive(Debug)]
pub struct TransferExtractor(pub TransferRequest);

impl FromRequest<Arc<AppState>, Body> for TransferExtractor {
    type Rejection = ApiError;

    async fn from_request(req: Request<Body>, state: &Arc<AppState>) -> Result<Self, Self::Rejection> {
        let Json(body): Json<TransferBody> = Json::from_request(req, state)
            .await
            .map_err(|e| ApiError::validation(format!("Invalid JSON: {}", e.body_text())))?;

        Ok(TransferExtractor(body.into_request()?))
    }
}

/// POST /transfer
pub async fn create_transfer(
    State(state): State<Arc<AppState>>,
    TransferExtractor(req): TransferExtractor,
) -> ApiResult<TransferResponse> {
    info!(
        sender_id = req.sender_id,
        receiver_id = req.receiver_id,
        amount = %req.amount,
        "Transfer request"
    );

    match state.engine.transfer(req).await {
        Ok(entry) => Ok(Json(TransferResponse::success(entry))),
        Err(e) => {
            warn!(
                sender_id = req.sender_id,
                receiver_id = req.receiver_id,
                code = e.code(),
                error = %e,
                "Transfer rejected"
            );
            Err(e.into())
        }
    }
}

/// GET /transactions
pub async fn list_transactions(State(state): State<Arc<AppState>>) -> ApiResult<Vec<LedgerEntry>> {
    Ok(Json(state.engine.transactions().await?))
}

/// GET /accounts/{id}
pub async fn get_account(
    State(state): State<Arc<AppState>>,
    Path(raw_id): Path<String>,
) -> ApiResult<Account> {
    let id: AccountId = raw_id
        .parse()
        .map_err(|_| ApiError::validation(format!("Invalid account id: {}", raw_id)))?;

    let account = state
        .store
        .find(id)
        .await
        .map_err(TransferError::from)?
        .ok_or(TransferError::AccountNotFound(id))?;
    Ok(Json(account))
}

/// GET /health
pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        timestamp_ms: chrono::Utc::now().timestamp_millis(),
    })
}
