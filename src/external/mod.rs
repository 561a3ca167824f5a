//! External Service Clients
//!
//! The transfer engine talks to the authorization and notification services
//! only through the [`Authorizer`] and [`Notifier`] traits, so it can be
//! driven by fakes in tests and timeouts stay a matter of configuration.

pub mod authorizer;
pub mod notifier;

pub use authorizer::{AuthorizationVerdict, Authorizer, HttpAuthorizer};
pub use notifier::{HttpNotifier, NotifyOutcome, Notifier};

/// Build the shared HTTP client with a bounded per-request timeout
pub(crate) fn http_client(timeout_ms: u64) -> Result<reqwest::Client, reqwest::Error> {
    reqwest::Client::builder()
        .timeout(std::time::Duration::from_millis(timeout_ms))
        .build()
}

/// Scripted fakes for engine tests
#[cfg(test)]
pub mod mock {
    use super::*;
    use crate::account::AccountId;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    /// Authorizer replaying a queue of verdicts, then a fixed fallback
    pub struct MockAuthorizer {
        script: Mutex<VecDeque<AuthorizationVerdict>>,
        fallback: AuthorizationVerdict,
        calls: AtomicUsize,
        delay: Option<Duration>,
    }

    impl MockAuthorizer {
        pub fn always(verdict: AuthorizationVerdict) -> Self {
            Self {
                script: Mutex::new(VecDeque::new()),
                fallback: verdict,
                calls: AtomicUsize::new(0),
                delay: None,
            }
        }

        pub fn approving() -> Self {
            Self::always(AuthorizationVerdict::Authorized)
        }

        pub fn denying() -> Self {
            Self::always(AuthorizationVerdict::Denied)
        }

        pub fn unavailable() -> Self {
            Self::always(AuthorizationVerdict::Unavailable("connection refused".into()))
        }

        /// Answer with `first` in order, then `fallback` forever
        pub fn scripted(first: Vec<AuthorizationVerdict>, fallback: AuthorizationVerdict) -> Self {
            Self {
                script: Mutex::new(first.into()),
                fallback,
                calls: AtomicUsize::new(0),
                delay: None,
            }
        }

        /// Hold every answer back by `delay`
        pub fn with_delay(mut self, delay: Duration) -> Self {
            self.delay = Some(delay);
            self
        }

        pub fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl Authorizer for MockAuthorizer {
        async fn authorize(&self) -> AuthorizationVerdict {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            self.script
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| self.fallback.clone())
        }
    }

    /// Notifier recording every delivery attempt
    pub struct MockNotifier {
        fail: bool,
        sent: Mutex<Vec<(AccountId, String)>>,
        attempts: AtomicUsize,
    }

    impl MockNotifier {
        pub fn new() -> Self {
            Self {
                fail: false,
                sent: Mutex::new(Vec::new()),
                attempts: AtomicUsize::new(0),
            }
        }

        pub fn failing() -> Self {
            Self {
                fail: true,
                ..Self::new()
            }
        }

        pub fn sent(&self) -> Vec<(AccountId, String)> {
            self.sent.lock().unwrap().clone()
        }

        pub fn attempts(&self) -> usize {
            self.attempts.load(Ordering::SeqCst)
        }

        /// Wait until at least `n` attempts were made (notification is spawned)
        pub async fn wait_for_attempts(&self, n: usize) {
            for _ in 0..200 {
                if self.attempts() >= n {
                    return;
                }
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
            panic!("expected {} notification attempts, saw {}", n, self.attempts());
        }
    }

    #[async_trait]
    impl Notifier for MockNotifier {
        async fn notify(&self, account_id: AccountId, message: &str) -> NotifyOutcome {
            self.attempts.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return NotifyOutcome::Failed("service unavailable".into());
            }
            self.sent
                .lock()
                .unwrap()
                .push((account_id, message.to_string()));
            NotifyOutcome::Sent
        }
    }
}
