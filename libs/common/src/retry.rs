//! Timeout and retry policy for store calls
//!
//! Every store call is bounded by a timeout. A transient failure (including
//! a timeout) is retried exactly once after a fixed backoff, then surfaced.

use std::env;
use std::future::Future;
use std::time::Duration;

use tracing::warn;

use crate::error::{StoreError, StoreResult};

/// Timeout and retry settings applied to each store operation
#[derive(Debug, Clone, Copy)]
pub struct StorePolicy {
    /// Upper bound for a single attempt
    pub timeout: Duration,
    /// Pause before the single retry of a transient failure
    pub retry_backoff: Duration,
}

impl Default for StorePolicy {
    fn default() -> Self {
        Self {
            timeout: Duration::from_millis(2000),
            retry_backoff: Duration::from_millis(50),
        }
    }
}

impl StorePolicy {
    /// Create a new StorePolicy from environment variables
    ///
    /// # Environment Variables
    /// - `STORE_TIMEOUT_MS`: Timeout per attempt in milliseconds (default: 2000)
    /// - `STORE_RETRY_BACKOFF_MS`: Backoff before the retry in milliseconds (default: 50)
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let timeout = env::var("STORE_TIMEOUT_MS")
            .ok()
            .and_then(|s| s.parse().ok())
            .map(Duration::from_millis)
            .unwrap_or(defaults.timeout);

        let retry_backoff = env::var("STORE_RETRY_BACKOFF_MS")
            .ok()
            .and_then(|s| s.parse().ok())
            .map(Duration::from_millis)
            .unwrap_or(defaults.retry_backoff);

        Self {
            timeout,
            retry_backoff,
        }
    }

    /// Run `op`, retrying once if the first attempt fails transiently
    pub async fn run<T, F, Fut>(&self, operation: &str, mut op: F) -> StoreResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = StoreResult<T>>,
    {
        match self.attempt(operation, &mut op).await {
            Err(e) if e.is_transient() => {
                warn!(
                    operation,
                    error = %e,
                    backoff_ms = self.retry_backoff.as_millis() as u64,
                    "Transient store failure, retrying once"
                );
                tokio::time::sleep(self.retry_backoff).await;
                self.attempt(operation, &mut op).await
            }
            result => result,
        }
    }

    async fn attempt<T, F, Fut>(&self, operation: &str, op: &mut F) -> StoreResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = StoreResult<T>>,
    {
        match tokio::time::timeout(self.timeout, op()).await {
            Ok(result) => result,
            Err(_) => Err(StoreError::Transient(format!(
                "{} timed out after {}ms",
                operation,
                self.timeout.as_millis()
            ))),
        }
    }
}
