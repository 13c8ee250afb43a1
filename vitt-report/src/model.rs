//! Generative model boundary.

use std::sync::Arc;

use async_trait::async_trait;
use vitt_rag::{RetryPolicy, retry_with_backoff};

use crate::error::{ReportError, Result};

/// A text-in, text-out generative model.
///
/// Implementations fail with [`ReportError::Generation`].
#[async_trait]
pub trait GenerativeModel: Send + Sync {
    /// Model identifier, used in logs and errors.
    fn name(&self) -> &str;

    /// Generate a completion for `prompt`.
    async fn generate(&self, prompt: &str) -> Result<String>;
}

/// A [`GenerativeModel`] decorator that retries failed generations under a
/// [`RetryPolicy`].
///
/// Generation is not idempotent: a retried prompt may produce different
/// text. That is acceptable for report sections, which are never cached.
pub struct RetryingModel {
    inner: Arc<dyn GenerativeModel>,
    policy: RetryPolicy,
}

impl RetryingModel {
    pub fn new(inner: Arc<dyn GenerativeModel>, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }
}

#[async_trait]
impl GenerativeModel for RetryingModel {
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn generate(&self, prompt: &str) -> Result<String> {
        retry_with_backoff(&self.policy, "generate", ReportError::is_retryable, || {
            self.inner.generate(prompt)
        })
        .await
    }
}
