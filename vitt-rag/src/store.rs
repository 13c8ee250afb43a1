//! Document store: a thin upsert/query surface over one provisioned index.

use std::sync::Arc;

use tracing::debug;

use crate::document::Metadata;
use crate::error::{RagError, Result};
use crate::index::IndexHandle;
use crate::vectorstore::{Match, VectorIndex, VectorRecord};

/// Upserts and queries vectors in the index behind an [`IndexHandle`].
///
/// Vector dimensions are checked against the handle before any call leaves
/// the process.
#[derive(Clone)]
pub struct DocumentStore {
    index: Arc<dyn VectorIndex>,
    handle: IndexHandle,
}

impl DocumentStore {
    /// Bind a store to a provisioned index.
    pub fn new(index: Arc<dyn VectorIndex>, handle: IndexHandle) -> Self {
        Self { index, handle }
    }

    /// The index this store writes to.
    pub fn handle(&self) -> &IndexHandle {
        &self.handle
    }

    /// Insert or overwrite the vector and metadata stored under `id`.
    ///
    /// Last write wins; there is no version check.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::StoreWriteError`] if the vector dimension does not
    /// match the index or the backend rejects the write.
    pub async fn upsert(&self, id: &str, vector: Vec<f32>, metadata: Metadata) -> Result<()> {
        if vector.len() != self.handle.dimension() {
            return Err(RagError::StoreWriteError {
                backend: self.index.backend().to_string(),
                message: format!(
                    "vector dimension {} for id '{id}' does not match index '{}' dimension {}",
                    vector.len(),
                    self.handle.name(),
                    self.handle.dimension()
                ),
            });
        }
        let record = VectorRecord { id: id.to_string(), values: vector, metadata };
        self.index.upsert(self.handle.name(), std::slice::from_ref(&record)).await?;
        debug!(index = self.handle.name(), id, "upserted vector");
        Ok(())
    }

    /// Return up to `top_k` matches for `vector`, most similar first.
    ///
    /// Ordering comes from the index and is not recomputed here. An empty
    /// index yields an empty `Vec`.
    ///
    /// # Errors
    ///
    /// - [`RagError::InvalidArgument`] if `top_k == 0`.
    /// - [`RagError::StoreQueryError`] on dimension mismatch or transport
    ///   failure.
    pub async fn query(
        &self,
        vector: &[f32],
        top_k: usize,
        include_metadata: bool,
    ) -> Result<Vec<Match>> {
        if top_k == 0 {
            return Err(RagError::InvalidArgument("top_k must be a positive integer".to_string()));
        }
        if vector.len() != self.handle.dimension() {
            return Err(RagError::StoreQueryError {
                backend: self.index.backend().to_string(),
                message: format!(
                    "query dimension {} does not match index '{}' dimension {}",
                    vector.len(),
                    self.handle.name(),
                    self.handle.dimension()
                ),
            });
        }
        let matches = self.index.query(self.handle.name(), vector, top_k, include_metadata).await?;
        debug!(index = self.handle.name(), top_k, match_count = matches.len(), "queried index");
        Ok(matches)
    }
}
