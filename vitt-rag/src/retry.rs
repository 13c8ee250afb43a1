//! Bounded retry with exponential backoff for remote boundary calls.
//!
//! Nothing in the retrieval core retries on its own. Deployments that want
//! to ride out transient failures (rate limiting, flaky networks) opt in by
//! wrapping a [`VectorIndex`] in a [`RetryingVectorIndex`], or by calling
//! [`retry_with_backoff`] around any fallible async operation.

use std::fmt::Display;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{RagError, Result};
use crate::vectorstore::{IndexDescription, IndexSpec, Match, VectorIndex, VectorRecord};

/// Attempt budget and delay schedule for [`retry_with_backoff`].
///
/// The delay before retry `n` (1-based) is `base_delay * 2^(n-1)`, capped at
/// `max_delay`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts including the first one. `1` disables retrying.
    pub max_attempts: u32,
    /// Delay before the first retry.
    #[serde(with = "millis")]
    pub base_delay: Duration,
    /// Upper bound on any single delay.
    #[serde(with = "millis")]
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(8),
        }
    }
}

impl RetryPolicy {
    /// A policy that performs exactly one attempt.
    pub fn none() -> Self {
        Self { max_attempts: 1, ..Self::default() }
    }

    /// Create a policy with the given attempt budget and base delay.
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self { max_attempts: max_attempts.max(1), base_delay, ..Self::default() }
    }

    /// Set the upper bound on a single delay.
    pub fn with_max_delay(mut self, max_delay: Duration) -> Self {
        self.max_delay = max_delay;
        self
    }

    /// Delay to sleep after the given failed attempt (1-based).
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let shift = attempt.saturating_sub(1).min(16);
        let delay = self.base_delay.saturating_mul(1u32 << shift);
        delay.min(self.max_delay)
    }
}

/// Run `op` until it succeeds, `should_retry` rejects the error, or the
/// policy's attempt budget is spent. The last error is returned unchanged.
pub async fn retry_with_backoff<T, E, F, Fut, P>(
    policy: &RetryPolicy,
    operation: &str,
    should_retry: P,
    mut op: F,
) -> std::result::Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = std::result::Result<T, E>>,
    P: Fn(&E) -> bool,
    E: Display,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 1;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(e) if attempt < max_attempts && should_retry(&e) => {
                let delay = policy.delay_for_attempt(attempt);
                warn!(
                    operation,
                    attempt,
                    max_attempts,
                    delay_ms = delay.as_millis() as u64,
                    error = %e,
                    "operation failed; retrying after backoff"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

/// A [`VectorIndex`] decorator that retries retryable failures of every
/// boundary call under a [`RetryPolicy`].
///
/// Upserts are safe to repeat because the store is last-write-wins by id.
/// Index deletion is retried too; a repeated delete of an index that is
/// already gone surfaces as the backend's own error.
pub struct RetryingVectorIndex {
    inner: Arc<dyn VectorIndex>,
    policy: RetryPolicy,
}

impl RetryingVectorIndex {
    /// Wrap `inner` with the given policy.
    pub fn new(inner: Arc<dyn VectorIndex>, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }
}

#[async_trait]
impl VectorIndex for RetryingVectorIndex {
    fn backend(&self) -> &str {
        self.inner.backend()
    }

    async fn list_index_names(&self) -> Result<Vec<String>> {
        retry_with_backoff(&self.policy, "list_index_names", RagError::is_retryable, || {
            self.inner.list_index_names()
        })
        .await
    }

    async fn create_index(&self, spec: &IndexSpec) -> Result<()> {
        retry_with_backoff(&self.policy, "create_index", RagError::is_retryable, || {
            self.inner.create_index(spec)
        })
        .await
    }

    async fn delete_index(&self, name: &str) -> Result<()> {
        retry_with_backoff(&self.policy, "delete_index", RagError::is_retryable, || {
            self.inner.delete_index(name)
        })
        .await
    }

    async fn describe_index(&self, name: &str) -> Result<IndexDescription> {
        retry_with_backoff(&self.policy, "describe_index", RagError::is_retryable, || {
            self.inner.describe_index(name)
        })
        .await
    }

    async fn upsert(&self, index: &str, records: &[VectorRecord]) -> Result<()> {
        retry_with_backoff(&self.policy, "upsert", RagError::is_retryable, || {
            self.inner.upsert(index, records)
        })
        .await
    }

    async fn query(
        &self,
        index: &str,
        vector: &[f32],
        top_k: usize,
        include_metadata: bool,
    ) -> Result<Vec<Match>> {
        retry_with_backoff(&self.policy, "query", RagError::is_retryable, || {
            self.inner.query(index, vector, top_k, include_metadata)
        })
        .await
    }
}

mod millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_millis(u64::deserialize(d)?))
    }
}
