//! Vector index lifecycle: creation, dimension verification and migration.

use std::sync::Arc;

use serde::Serialize;
use tracing::{info, warn};

use crate::embedding::Embedder;
use crate::error::{RagError, Result};
use crate::lock::{InProcessLock, ProvisionLock};
use crate::vectorstore::{IndexSpec, Metric, VectorIndex};

/// Text embedded once to learn the embedder's output dimension.
pub const SENTINEL_TEXT: &str = "test";

/// A provisioned index whose dimension matches the active embedder.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct IndexHandle {
    name: String,
    dimension: usize,
    metric: Metric,
}

impl IndexHandle {
    /// Index name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Dimension every stored and queried vector must have.
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// Distance metric.
    pub fn metric(&self) -> Metric {
        self.metric
    }
}

/// Ensures a remote index exists with the dimension of the active embedder.
///
/// A dimension mismatch is healed by dropping and recreating the index. This
/// is destructive: vectors indexed under the previous embedding model are
/// lost and are not re-embedded, because their original text cannot be
/// recovered from an incompatible index.
pub struct IndexManager {
    index: Arc<dyn VectorIndex>,
    lock: Arc<dyn ProvisionLock>,
    cloud: String,
    region: String,
}

impl IndexManager {
    /// Create a manager that places new indexes in `cloud`/`region`.
    ///
    /// Provisioning is serialised with the process-wide [`InProcessLock`];
    /// use [`with_lock`](Self::with_lock) for cross-process exclusion.
    pub fn new(
        index: Arc<dyn VectorIndex>,
        cloud: impl Into<String>,
        region: impl Into<String>,
    ) -> Self {
        Self { index, lock: InProcessLock::global(), cloud: cloud.into(), region: region.into() }
    }

    /// Replace the provisioning lock.
    pub fn with_lock(mut self, lock: Arc<dyn ProvisionLock>) -> Self {
        self.lock = lock;
        self
    }

    /// Make sure index `name` exists with the embedder's dimension.
    ///
    /// 1. Probe the embedder with [`SENTINEL_TEXT`].
    /// 2. Create the index if it is absent.
    /// 3. Otherwise compare dimensions; reuse on match, drop and recreate on
    ///    mismatch.
    ///
    /// # Errors
    ///
    /// - [`RagError::EmbeddingError`] if the probe fails or yields an empty
    ///   vector.
    /// - [`RagError::IndexProvisionError`] if listing, describing, creating
    ///   or deleting fails. Nothing is retried here.
    pub async fn ensure_index(&self, name: &str, embedder: &dyn Embedder) -> Result<IndexHandle> {
        let expected_dim = embedder.embed(SENTINEL_TEXT).await?.len();
        if expected_dim == 0 {
            return Err(RagError::EmbeddingError {
                provider: embedder.model_id().to_string(),
                message: "probe embedding is empty".to_string(),
            });
        }

        let _guard = self.lock.acquire(name).await?;

        let names = self.index.list_index_names().await.map_err(|e| self.provision_err(name, e))?;
        if names.iter().any(|n| n == name) {
            let actual_dim = self
                .index
                .describe_index(name)
                .await
                .map_err(|e| self.provision_err(name, e))?
                .dimension;

            if actual_dim == expected_dim {
                info!(index = name, dimension = actual_dim, "reusing vector index");
            } else {
                warn!(
                    index = name,
                    index_dimension = actual_dim,
                    model_dimension = expected_dim,
                    model = embedder.model_id(),
                    "dimension mismatch; dropping and recreating index, existing vectors are lost"
                );
                self.index.delete_index(name).await.map_err(|e| self.provision_err(name, e))?;
                self.create(name, expected_dim).await?;
            }
        } else {
            info!(index = name, dimension = expected_dim, "creating vector index");
            self.create(name, expected_dim).await?;
        }

        Ok(IndexHandle { name: name.to_string(), dimension: expected_dim, metric: Metric::Cosine })
    }

    async fn create(&self, name: &str, dimension: usize) -> Result<()> {
        let spec = IndexSpec {
            name: name.to_string(),
            dimension,
            metric: Metric::Cosine,
            cloud: self.cloud.clone(),
            region: self.region.clone(),
        };
        self.index.create_index(&spec).await.map_err(|e| self.provision_err(name, e))
    }

    /// Control-plane failures surface as provisioning errors whatever the
    /// backend reported.
    fn provision_err(&self, name: &str, err: RagError) -> RagError {
        match err {
            e @ RagError::IndexProvisionError { .. } => e,
            other => RagError::IndexProvisionError {
                index: name.to_string(),
                message: format!("{} backend: {other}", self.index.backend()),
            },
        }
    }
}

#[cfg(test)]
impl IndexHandle {
    pub(crate) fn for_tests(name: &str, dimension: usize) -> Self {
        Self { name: name.to_string(), dimension, metric: Metric::Cosine }
    }
}
