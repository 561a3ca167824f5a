use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::fs;

use crate::account::AccountKind;
use crate::money::Amount;

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct AppConfig {
    pub log_level: String,
    pub log_dir: String,
    pub log_file: String,
    pub use_json: bool,
    pub rotation: String,
    pub gateway: GatewayConfig,
    #[serde(default)]
    pub authorizer: AuthorizerConfig,
    #[serde(default)]
    pub notifier: NotifierConfig,
    #[serde(default)]
    pub transfer: TransferConfig,
    /// PostgreSQL connection URL; the in-memory store is used when absent
    #[serde(default)]
    pub postgres_url: Option<String>,
    /// Accounts loaded into the in-memory store at startup
    #[serde(default)]
    pub seed_accounts: Vec<SeedAccount>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct GatewayConfig {
    pub host: String,
    pub port: u16,
}

/// External authorization service
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct AuthorizerConfig {
    pub url: String,
    pub timeout_ms: u64,
    /// Attempts made by the engine while the authorizer is unavailable
    pub max_attempts: u32,
    /// Dotted path of the verdict field in the response body
    pub approval_field: String,
    /// Value of `approval_field` that means "approved"
    pub approval_value: serde_json::Value,
}

impl Default for AuthorizerConfig {
    fn default() -> Self {
        Self {
            url: "https://util.devi.tools/api/v2/authorize".to_string(),
            timeout_ms: 3000,
            max_attempts: 1,
            approval_field: "data.authorization".to_string(),
            approval_value: serde_json::Value::Bool(true),
        }
    }
}

/// External notification service
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct NotifierConfig {
    pub url: String,
    pub timeout_ms: u64,
    pub max_attempts: u32,
    pub message: String,
}

impl Default for NotifierConfig {
    fn default() -> Self {
        Self {
            url: "https://util.devi.tools/api/v1/notify".to_string(),
            timeout_ms: 3000,
            max_attempts: 3,
            message: "You have received a payment.".to_string(),
        }
    }
}

/// When the external authorizer is consulted relative to the balance commit
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum AuthorizationPolicy {
    /// Authorize first; nothing is mutated for a denied transfer
    #[default]
    BeforeCommit,
    /// Commit balances first; a denial triggers a compensating reversal
    AfterCommit,
}

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
#[serde(default)]
pub struct TransferConfig {
    pub authorization: AuthorizationPolicy,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct SeedAccount {
    pub id: i64,
    pub kind: AccountKind,
    pub balance: Amount,
}

impl AppConfig {
    pub fn load(env: &str) -> anyhow::Result<Self> {
        let config_path = format!("config/{}.yaml", env);
        let content = fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read config file: {}", config_path))?;
        let mut config = Self::from_yaml(&content)
            .with_context(|| format!("Failed to parse config yaml: {}", config_path))?;
        config.apply_env_overrides(|key| std::env::var(key).ok());
        Ok(config)
    }

    pub fn from_yaml(content: &str) -> Result<Self, serde_yaml::Error> {
        serde_yaml::from_str(content)
    }

    /// Per-deployment overrides: `AUTHORIZER_URL`, `NOTIFIER_URL`, `POSTGRES_URL`
    pub fn apply_env_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup("AUTHORIZER_URL") {
            self.authorizer.url = url;
        }
        if let Some(url) = lookup("NOTIFIER_URL") {
            self.notifier.url = url;
        }
        if let Some(url) = lookup("POSTGRES_URL") {
            self.postgres_url = Some(url);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"
log_level: info
log_dir: ./logs
log_file: transfer.log
use_json: false
rotation: daily
gateway:
  host: 127.0.0.1
  port: 8080
"#;

    #[test]
    fn test_minimal_config_uses_defaults() {
        let config = AppConfig::from_yaml(MINIMAL).unwrap();
        assert_eq!(config.gateway.port, 8080);
        assert_eq!(config.authorizer.timeout_ms, 3000);
        assert_eq!(config.authorizer.max_attempts, 1);
        assert_eq!(config.authorizer.approval_value, serde_json::json!(true));
        assert_eq!(config.notifier.message, "You have received a payment.");
        assert_eq!(
            config.transfer.authorization,
            AuthorizationPolicy::BeforeCommit
        );
        assert!(config.postgres_url.is_none());
        assert!(config.seed_accounts.is_empty());
    }

    #[test]
    fn test_full_config() {
        let yaml = format!(
            "{}{}",
            MINIMAL,
            r#"
authorizer:
  url: http://authorizer.local/authorize
  timeout_ms: 500
  approval_field: message
  approval_value: Autorizado
notifier:
  url: http://notifier.local/notify
  max_attempts: 5
transfer:
  authorization: after_commit
seed_accounts:
  - id: 1
    kind: personal
    balance: 100
  - id: 2
    kind: merchant
    balance: "10.50"
"#
        );
        let config = AppConfig::from_yaml(&yaml).unwrap();
        assert_eq!(config.authorizer.url, "http://authorizer.local/authorize");
        assert_eq!(config.authorizer.timeout_ms, 500);
        assert_eq!(config.authorizer.approval_field, "message");
        assert_eq!(config.authorizer.approval_value, serde_json::json!("Autorizado"));
        // Unspecified fields keep their defaults
        assert_eq!(config.authorizer.max_attempts, 1);
        assert_eq!(config.notifier.max_attempts, 5);
        assert_eq!(config.notifier.timeout_ms, 3000);
        assert_eq!(
            config.transfer.authorization,
            AuthorizationPolicy::AfterCommit
        );
        assert_eq!(config.seed_accounts.len(), 2);
        assert_eq!(config.seed_accounts[0].balance, Amount::units(100));
        assert_eq!(config.seed_accounts[1].kind, AccountKind::Merchant);
        assert_eq!(config.seed_accounts[1].balance, Amount::from_minor(1050));
    }

    #[test]
    fn test_env_overrides() {
        let mut config = AppConfig::from_yaml(MINIMAL).unwrap();
        config.apply_env_overrides(|key| match key {
            "AUTHORIZER_URL" => Some("http://a".to_string()),
            "POSTGRES_URL" => Some("postgres://db".to_string()),
            _ => None,
        });
        assert_eq!(config.authorizer.url, "http://a");
        assert_eq!(config.notifier.url, NotifierConfig::default().url);
        assert_eq!(config.postgres_url.as_deref(), Some("postgres://db"));
    }

    #[test]
    fn test_shipped_configs_parse() {
        let dev = AppConfig::from_yaml(include_str!("../config/dev.yaml")).unwrap();
        assert_eq!(dev.seed_accounts.len(), 3);
        assert_eq!(dev.authorizer.max_attempts, 2);

        let prod = AppConfig::from_yaml(include_str!("../config/prod.yaml")).unwrap();
        assert!(prod.use_json);
        assert!(prod.seed_accounts.is_empty());
    }

    #[test]
    fn test_missing_config_file_is_an_error() {
        let err = AppConfig::load("no-such-env").unwrap_err();
        assert!(err.to_string().contains("config/no-such-env.yaml"));
    }
}
