//! Authorizer Client
//!
//! Asks the external authorization service whether a transfer may proceed.
//! The client never retries; retry policy belongs to the caller.

use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, warn};

use crate::config::AuthorizerConfig;

/// Outcome of one authorization call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthorizationVerdict {
    Authorized,
    Denied,
    /// Network error, timeout, server error or unreadable body
    Unavailable(String),
}

#[async_trait]
pub trait Authorizer: Send + Sync {
    async fn authorize(&self) -> AuthorizationVerdict;
}

/// HTTP authorizer (`GET <url>`)
pub struct HttpAuthorizer {
    client: reqwest::Client,
    url: String,
    approval_field: String,
    approval_value: Value,
}

impl HttpAuthorizer {
    pub fn new(config: &AuthorizerConfig) -> Result<Self, reqwest::Error> {
        Ok(Self {
            client: super::http_client(config.timeout_ms)?,
            url: config.url.clone(),
            approval_field: config.approval_field.clone(),
            approval_value: config.approval_value.clone(),
        })
    }

    /// Interpret a response body
    pub fn verdict_from_body(&self, body: &[u8]) -> AuthorizationVerdict {
        let json: Value = match serde_json::from_slice(body) {
            Ok(json) => json,
            Err(e) => {
                return AuthorizationVerdict::Unavailable(format!("Malformed body: {}", e));
            }
        };

        match lookup(&json, &self.approval_field) {
            Some(value) if *value == self.approval_value => AuthorizationVerdict::Authorized,
            _ => AuthorizationVerdict::Denied,
        }
    }
}

/// Resolve a dotted path (`data.authorization`) inside a JSON document
fn lookup<'a>(json: &'a Value, path: &str) -> Option<&'a Value> {
    path.split('.')
        .filter(|segment| !segment.is_empty())
        .try_fold(json, |node, segment| node.get(segment))
}

#[async_trait]
impl Authorizer for HttpAuthorizer {
    async fn authorize(&self) -> AuthorizationVerdict {
        let response = match self.client.get(&self.url).send().await {
            Ok(response) => response,
            Err(e) => {
                warn!(url = %self.url, error = %e, timeout = e.is_timeout(), "Authorizer unreachable");
                return AuthorizationVerdict::Unavailable(e.to_string());
            }
        };

        let status = response.status();
        if status.is_server_error() {
            warn!(url = %self.url, status = status.as_u16(), "Authorizer server error");
            return AuthorizationVerdict::Unavailable(format!("HTTP {}", status.as_u16()));
        }

        let body = match response.bytes().await {
            Ok(body) => body,
            Err(e) => {
                warn!(url = %self.url, error = %e, "Failed to read authorizer response");
                return AuthorizationVerdict::Unavailable(e.to_string());
            }
        };

        let verdict = self.verdict_from_body(&body);
        debug!(status = status.as_u16(), verdict = ?verdict, "Authorizer replied");
        verdict
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn authorizer(field: &str, value: Value) -> HttpAuthorizer {
        HttpAuthorizer::new(&AuthorizerConfig {
            url: "http://127.0.0.1:9/authorize".to_string(),
            timeout_ms: 100,
            max_attempts: 1,
            approval_field: field.to_string(),
            approval_value: value,
        })
        .unwrap()
    }

    #[test]
    fn test_nested_boolean_marker() {
        let auth = authorizer("data.authorization", Value::Bool(true));
        assert_eq!(
            auth.verdict_from_body(br#"{"status":"success","data":{"authorization":true}}"#),
            AuthorizationVerdict::Authorized
        );
        assert_eq!(
            auth.verdict_from_body(br#"{"status":"fail","data":{"authorization":false}}"#),
            AuthorizationVerdict::Denied
        );
    }

    #[test]
    fn test_message_marker() {
        let auth = authorizer("message", Value::String("Autorizado".to_string()));
        assert_eq!(
            auth.verdict_from_body(br#"{"message":"Autorizado"}"#),
            AuthorizationVerdict::Authorized
        );
        assert_eq!(
            auth.verdict_from_body(br#"{"message":"Negado"}"#),
            AuthorizationVerdict::Denied
        );
        // Missing field is a well-formed denial
        assert_eq!(
            auth.verdict_from_body(br#"{"status":"ok"}"#),
            AuthorizationVerdict::Denied
        );
    }

    #[test]
    fn test_malformed_body_is_unavailable() {
        let auth = authorizer("message", Value::String("Autorizado".to_string()));
        assert!(matches!(
            auth.verdict_from_body(b"<html>gateway timeout</html>"),
            AuthorizationVerdict::Unavailable(_)
        ));
        assert!(matches!(
            auth.verdict_from_body(b""),
            AuthorizationVerdict::Unavailable(_)
        ));
    }

    #[test]
    fn test_lookup_paths() {
        let json = serde_json::json!({"a": {"b": {"c": 1}}});
        assert_eq!(lookup(&json, "a.b.c"), Some(&serde_json::json!(1)));
        assert_eq!(lookup(&json, "a.x"), None);
        assert_eq!(lookup(&json, ""), Some(&json));
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_is_unavailable() {
        // Port 9 (discard) is closed on test hosts
        let auth = authorizer("message", Value::String("Autorizado".to_string()));
        assert!(matches!(
            auth.authorize().await,
            AuthorizationVerdict::Unavailable(_)
        ));
    }
}
