//! Transfer Engine
//!
//! Orchestrates one transfer end to end:
//!
//! ```text
//! validate → authorize → [lock → debit/credit + ledger entry → commit] → notify
//! ```
//!
//! With [`AuthorizationPolicy::AfterCommit`] the order becomes
//! `validate → commit → authorize → ledger entry`, and a denial is undone by a
//! compensating unit of work.
//!
//! # Invariants
//!
//! 1. Balances never go negative: sufficiency is re-checked under the locks
//! 2. Both legs commit together or not at all
//! 3. A ledger entry exists iff the transfer was committed and authorized
//! 4. Notification never changes the outcome

use std::sync::Arc;

use tracing::{debug, error, info, warn};

use super::error::TransferError;
use super::types::{TransferRequest, TransferResult};
use crate::account::{AccountId, AccountStore, UnitOfWork};
use crate::config::{AppConfig, AuthorizationPolicy};
use crate::external::{AuthorizationVerdict, Authorizer, Notifier, NotifyOutcome};
use crate::ledger::{Ledger, LedgerEntry};
use crate::money::Amount;

/// Engine tuning, normally derived from [`AppConfig`]
#[derive(Debug, Clone)]
pub struct EngineSettings {
    pub authorization: AuthorizationPolicy,
    /// Total authorizer calls made while it reports `Unavailable`
    pub authorizer_attempts: u32,
    pub notifier_attempts: u32,
    pub notification_message: String,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            authorization: AuthorizationPolicy::BeforeCommit,
            authorizer_attempts: 1,
            notifier_attempts: 3,
            notification_message: "You have received a payment.".to_string(),
        }
    }
}

impl EngineSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            authorization: config.transfer.authorization,
            authorizer_attempts: config.authorizer.max_attempts,
            notifier_attempts: config.notifier.max_attempts,
            notification_message: config.notifier.message.clone(),
        }
    }
}

/// Transfer Engine - the funds-transfer core
///
/// Cloning is cheap: every collaborator sits behind an `Arc`.
#[derive(Clone)]
pub struct TransferEngine {
    store: Arc<dyn AccountStore>,
    ledger: Arc<dyn Ledger>,
    authorizer: Arc<dyn Authorizer>,
    notifier: Arc<dyn Notifier>,
    settings: EngineSettings,
}

impl TransferEngine {
    pub fn new(
        store: Arc<dyn AccountStore>,
        ledger: Arc<dyn Ledger>,
        authorizer: Arc<dyn Authorizer>,
        notifier: Arc<dyn Notifier>,
        settings: EngineSettings,
    ) -> Self {
        Self {
            store,
            ledger,
            authorizer,
            notifier,
            settings,
        }
    }

    /// Move `amount` from sender to receiver.
    pub async fn transfer(&self, req: TransferRequest) -> TransferResult {
        let TransferRequest {
            sender_id,
            receiver_id,
            amount,
        } = req;

        // === Preconditions (no state is touched) ===
        let sender = self
            .store
            .find(sender_id)
            .await?
            .ok_or(TransferError::AccountNotFound(sender_id))?;
        if self.store.find(receiver_id).await?.is_none() {
            return Err(TransferError::AccountNotFound(receiver_id));
        }
        if amount.is_zero() {
            return Err(TransferError::InvalidAmount);
        }
        if sender_id == receiver_id {
            return Err(TransferError::InvalidTransfer);
        }
        if !sender.kind.can_send() {
            debug!(sender_id, "Rejected: merchant sender");
            return Err(TransferError::MerchantCannotSend);
        }
        if sender.balance < amount {
            debug!(sender_id, balance = %sender.balance, amount = %amount, "Rejected: insufficient balance");
            return Err(TransferError::InsufficientBalance);
        }

        let entry = match self.settings.authorization {
            AuthorizationPolicy::BeforeCommit => {
                self.authorize(&req).await?;
                self.settle(&req, true).await?.ok_or_else(|| {
                    TransferError::PersistenceFailure("ledger entry was not staged".to_string())
                })?
            }
            AuthorizationPolicy::AfterCommit => self.settle_then_authorize_detached(req).await?,
        };

        info!(
            sender_id,
            receiver_id,
            amount = %amount,
            entry_id = %entry.id,
            "Transfer committed"
        );

        self.spawn_notification(receiver_id);
        Ok(entry)
    }

    /// Ledger read access for the listing endpoint
    pub async fn transactions(&self) -> Result<Vec<LedgerEntry>, TransferError> {
        Ok(self.ledger.list().await?)
    }

    /// Ask the authorizer, retrying only while it is unavailable
    async fn authorize(&self, req: &TransferRequest) -> Result<(), TransferError> {
        let attempts = self.settings.authorizer_attempts.max(1);
        let mut last_reason = String::new();

        for attempt in 1..=attempts {
            match self.authorizer.authorize().await {
                AuthorizationVerdict::Authorized => return Ok(()),
                AuthorizationVerdict::Denied => {
                    info!(
                        sender_id = req.sender_id,
                        receiver_id = req.receiver_id,
                        "Transfer not authorized"
                    );
                    return Err(TransferError::NotAuthorized);
                }
                AuthorizationVerdict::Unavailable(reason) => {
                    warn!(attempt, attempts, reason = %reason, "Authorizer unavailable");
                    last_reason = reason;
                }
            }
        }

        Err(TransferError::AuthorizerUnavailable(last_reason))
    }

    /// One atomic unit: debit sender, credit receiver, optionally stage the
    /// ledger entry. Any failure before commit leaves the store untouched.
    async fn settle(
        &self,
        req: &TransferRequest,
        with_entry: bool,
    ) -> Result<Option<LedgerEntry>, TransferError> {
        let mut uow = self.store.begin(&[req.sender_id, req.receiver_id]).await?;

        if let Err(e) = move_funds(uow.as_mut(), req.sender_id, req.receiver_id, req.amount) {
            rollback_quietly(uow).await;
            return Err(e);
        }
        let entry = with_entry.then(|| uow.append(req.sender_id, req.receiver_id, req.amount));

        uow.commit().await.map_err(|e| {
            error!(sender_id = req.sender_id, receiver_id = req.receiver_id, error = %e, "Commit failed, rolled back");
            TransferError::PersistenceFailure(e.to_string())
        })?;
        Ok(entry)
    }

    /// Runs [`Self::settle_then_authorize`] on its own task. Once funds have
    /// moved, a dropped caller (client disconnect, request timeout) must not
    /// skip the authorization check or its compensation.
    async fn settle_then_authorize_detached(&self, req: TransferRequest) -> TransferResult {
        let engine = self.clone();
        let task = tokio::spawn(async move { engine.settle_then_authorize(&req).await });

        match task.await {
            Ok(result) => result,
            Err(e) => {
                error!(
                    sender_id = req.sender_id,
                    receiver_id = req.receiver_id,
                    amount = %req.amount,
                    error = %e,
                    reconciliation = true,
                    "Settlement task aborted - manual reconciliation required"
                );
                Err(TransferError::CompensationFailure(format!(
                    "settlement task aborted: {}",
                    e
                )))
            }
        }
    }

    /// Legacy ordering: commit first, then authorize, compensating on failure
    async fn settle_then_authorize(&self, req: &TransferRequest) -> TransferResult {
        self.settle(req, false).await?;

        if let Err(cause) = self.authorize(req).await {
            return Err(self.compensate(req, cause).await);
        }

        match self
            .ledger
            .record(req.sender_id, req.receiver_id, req.amount)
            .await
        {
            Ok(entry) => Ok(entry),
            Err(e) => {
                let cause = TransferError::PersistenceFailure(e.to_string());
                Err(self.compensate(req, cause).await)
            }
        }
    }

    /// Undo a committed transfer. Returns the error to report to the caller.
    async fn compensate(&self, req: &TransferRequest, cause: TransferError) -> TransferError {
        warn!(
            sender_id = req.sender_id,
            receiver_id = req.receiver_id,
            amount = %req.amount,
            cause = %cause,
            "Reversing committed transfer"
        );

        match self.reverse(req).await {
            Ok(()) => {
                info!(
                    sender_id = req.sender_id,
                    receiver_id = req.receiver_id,
                    "Transfer reversed"
                );
                cause
            }
            Err(e) => {
                error!(
                    sender_id = req.sender_id,
                    receiver_id = req.receiver_id,
                    amount = %req.amount,
                    cause = %cause,
                    error = %e,
                    reconciliation = true,
                    "Compensation failed - manual reconciliation required"
                );
                TransferError::CompensationFailure(format!("{} (while handling: {})", e, cause))
            }
        }
    }

    async fn reverse(&self, req: &TransferRequest) -> Result<(), TransferError> {
        let mut uow = self.store.begin(&[req.sender_id, req.receiver_id]).await?;
        if let Err(e) = move_funds(uow.as_mut(), req.receiver_id, req.sender_id, req.amount) {
            rollback_quietly(uow).await;
            return Err(e);
        }
        uow.commit().await?;
        Ok(())
    }

    /// Fire-and-forget receiver notification
    fn spawn_notification(&self, receiver_id: AccountId) {
        let notifier = self.notifier.clone();
        let message = self.settings.notification_message.clone();
        let attempts = self.settings.notifier_attempts.max(1);

        tokio::spawn(async move {
            for attempt in 1..=attempts {
                match notifier.notify(receiver_id, &message).await {
                    NotifyOutcome::Sent => {
                        debug!(receiver_id, attempt, "Notification sent");
                        return;
                    }
                    NotifyOutcome::Failed(reason) => {
                        warn!(receiver_id, attempt, reason = %reason, "Notification failed");
                    }
                }
            }
            error!(receiver_id, attempts, "Notification abandoned");
        });
    }
}

/// Debit `from`, credit `to` inside an open unit of work
fn move_funds(
    uow: &mut dyn UnitOfWork,
    from: AccountId,
    to: AccountId,
    amount: Amount,
) -> Result<(), TransferError> {
    let mut debit_side = uow.load(from)?;
    let mut credit_side = uow.load(to)?;

    debit_side
        .debit(amount)
        .map_err(|_| TransferError::InsufficientBalance)?;
    credit_side
        .credit(amount)
        .map_err(|e| TransferError::PersistenceFailure(e.to_string()))?;

    uow.save(debit_side)?;
    uow.save(credit_side)?;
    Ok(())
}

async fn rollback_quietly(uow: Box<dyn UnitOfWork>) {
    if let Err(e) = uow.rollback().await {
        warn!(error = %e, "Rollback reported an error");
    }
}
