//! Notifier Client
//!
//! Best-effort delivery of "payment received" messages. Failures are only
//! reported back as [`NotifyOutcome::Failed`] for logging.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::account::AccountId;
use crate::config::NotifierConfig;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NotifyOutcome {
    Sent,
    Failed(String),
}

impl NotifyOutcome {
    #[inline]
    pub fn is_sent(&self) -> bool {
        matches!(self, NotifyOutcome::Sent)
    }
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, account_id: AccountId, message: &str) -> NotifyOutcome;
}

#[derive(Debug, Serialize)]
struct NotifyRequest<'a> {
    user_id: AccountId,
    message: &'a str,
}

#[derive(Debug, Deserialize)]
struct NotifyReply {
    status: Option<String>,
    message: Option<String>,
}

/// HTTP notifier (`POST <url>` with `{user_id, message}`)
pub struct HttpNotifier {
    client: reqwest::Client,
    url: String,
}

impl HttpNotifier {
    pub fn new(config: &NotifierConfig) -> Result<Self, reqwest::Error> {
        Ok(Self {
            client: super::http_client(config.timeout_ms)?,
            url: config.url.clone(),
        })
    }
}

/// Interpret a notifier response. A 2xx with an empty body counts as sent.
/// A `"success"` marker only counts alongside a 2xx status.
pub fn outcome_from_reply(http_status: u16, body: &[u8]) -> NotifyOutcome {
    let success = (200..300).contains(&http_status);
    if success && body.iter().all(u8::is_ascii_whitespace) {
        return NotifyOutcome::Sent;
    }

    match serde_json::from_slice::<NotifyReply>(body) {
        Ok(reply) if success && reply.status.as_deref() == Some("success") => NotifyOutcome::Sent,
        Ok(reply) if !success => NotifyOutcome::Failed(
            reply
                .message
                .unwrap_or_else(|| format!("HTTP {}", http_status)),
        ),
        Ok(reply) => NotifyOutcome::Failed(
            reply
                .message
                .or(reply.status)
                .unwrap_or_else(|| format!("HTTP {}", http_status)),
        ),
        Err(_) => NotifyOutcome::Failed(format!("HTTP {} with unreadable body", http_status)),
    }
}

#[async_trait]
impl Notifier for HttpNotifier {
    async fn notify(&self, account_id: AccountId, message: &str) -> NotifyOutcome {
        let request = NotifyRequest {
            user_id: account_id,
            message,
        };

        let response = match self.client.post(&self.url).json(&request).send().await {
            Ok(response) => response,
            Err(e) => return NotifyOutcome::Failed(e.to_string()),
        };

        let status = response.status().as_u16();
        match response.bytes().await {
            Ok(body) => {
                let outcome = outcome_from_reply(status, &body);
                debug!(account_id, status, outcome = ?outcome, "Notifier replied");
                outcome
            }
            Err(e) => NotifyOutcome::Failed(e.to_string()),
        }
    }
}
