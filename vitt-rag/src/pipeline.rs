//! Retrieval orchestrator.
//!
//! [`RagPipeline`] composes an [`Embedder`] and a [`DocumentStore`] into the
//! two operations the rest of the system uses: index a document, and find
//! the documents most relevant to a query.
//!
//! # Example
//!
//! ```rust,ignore
//! use vitt_rag::{Document, HashEmbedder, InMemoryVectorIndex, RagConfig, RagPipeline};
//!
//! let pipeline = RagPipeline::builder()
//!     .config(RagConfig::default())
//!     .embedder(Arc::new(HashEmbedder::new(384)))
//!     .vector_index(Arc::new(InMemoryVectorIndex::new()))
//!     .build()
//!     .await?;
//!
//! let id = pipeline.index_document(Document::new("TCS beat estimates")).await?;
//! let results = pipeline.retrieve_relevant_documents("TCS earnings", None).await?;
//! ```

use std::sync::Arc;

use serde_json::Value;
use tracing::{error, info};
use uuid::Uuid;

use crate::config::RagConfig;
use crate::document::{DATE_KEY, Document, RetrievalResult, SOURCE_KEY, TEXT_KEY, metadata_text};
use crate::embedding::Embedder;
use crate::error::{RagError, Result};
use crate::index::{IndexHandle, IndexManager};
use crate::lock::ProvisionLock;
use crate::store::DocumentStore;
use crate::vectorstore::VectorIndex;

/// The retrieval orchestrator.
///
/// Construct one per process with [`RagPipeline::builder()`]; building it
/// provisions the index once. Share it behind an `Arc`.
pub struct RagPipeline {
    config: RagConfig,
    embedder: Arc<dyn Embedder>,
    store: DocumentStore,
}

impl RagPipeline {
    /// Create a new [`RagPipelineBuilder`].
    pub fn builder() -> RagPipelineBuilder {
        RagPipelineBuilder::default()
    }

    /// Return a reference to the pipeline configuration.
    pub fn config(&self) -> &RagConfig {
        &self.config
    }

    /// Return a reference to the embedder.
    pub fn embedder(&self) -> &Arc<dyn Embedder> {
        &self.embedder
    }

    /// Return the provisioned index handle.
    pub fn index(&self) -> &IndexHandle {
        self.store.handle()
    }

    /// Embed and store one document; return its id.
    ///
    /// A random UUID is assigned when the document has no id. The document
    /// text is written into metadata under `"text"`, overriding any
    /// caller-supplied value, so that it comes back with every match.
    ///
    /// The write is visible to the next query on backends with read-after-
    /// write consistency such as [`InMemoryVectorIndex`](crate::InMemoryVectorIndex).
    /// Eventually consistent backends (Pinecone serverless) may not return
    /// the document for a short while after this call returns.
    ///
    /// # Errors
    ///
    /// - [`RagError::InvalidArgument`] if the text or an explicit id is blank.
    /// - [`RagError::EmbeddingError`] / [`RagError::StoreWriteError`] from the
    ///   embedder or store, unchanged.
    pub async fn index_document(&self, document: Document) -> Result<String> {
        let Document { id, text, mut metadata } = document;
        if text.trim().is_empty() {
            return Err(RagError::InvalidArgument("document text must not be empty".to_string()));
        }
        let id = match id {
            Some(id) if id.trim().is_empty() => {
                return Err(RagError::InvalidArgument("document id must not be blank".to_string()));
            }
            Some(id) => id,
            None => Uuid::new_v4().to_string(),
        };
        metadata.insert(TEXT_KEY.to_string(), Value::String(text.clone()));

        let embedding = self.embedder.embed(&text).await.inspect_err(|e| {
            error!(document.id = %id, error = %e, "embedding failed during indexing");
        })?;
        self.store.upsert(&id, embedding, metadata).await.inspect_err(|e| {
            error!(document.id = %id, error = %e, "upsert failed during indexing");
        })?;

        info!(document.id = %id, index = self.store.handle().name(), "indexed document");
        Ok(id)
    }

    /// Index documents one at a time in input order.
    ///
    /// Stops at the first failure; documents before it remain indexed.
    ///
    /// # Errors
    ///
    /// Returns the first error from [`index_document`](Self::index_document).
    pub async fn index_documents(
        &self,
        documents: impl IntoIterator<Item = Document>,
    ) -> Result<Vec<String>> {
        let mut ids = Vec::new();
        for document in documents {
            ids.push(self.index_document(document).await?);
        }
        info!(document_count = ids.len(), "indexed document batch");
        Ok(ids)
    }

    /// Find the `top_k` documents most similar to `query`.
    ///
    /// `top_k` defaults to `max_documents_retrieved` from the configuration.
    /// Results keep the store's descending-score order; nothing is re-ranked.
    /// Missing `text`, `source` or `date` metadata becomes `""`.
    ///
    /// # Errors
    ///
    /// - [`RagError::InvalidArgument`] if `top_k` is `Some(0)`.
    /// - [`RagError::EmbeddingError`] / [`RagError::StoreQueryError`] from the
    ///   embedder or store, unchanged.
    pub async fn retrieve_relevant_documents(
        &self,
        query: &str,
        top_k: Option<usize>,
    ) -> Result<Vec<RetrievalResult>> {
        let top_k = top_k.unwrap_or(self.config.max_documents_retrieved);
        if top_k == 0 {
            return Err(RagError::InvalidArgument("top_k must be a positive integer".to_string()));
        }

        let query_embedding = self.embedder.embed(query).await.inspect_err(|e| {
            error!(error = %e, "embedding failed during retrieval");
        })?;
        let matches = self.store.query(&query_embedding, top_k, true).await.inspect_err(|e| {
            error!(error = %e, "vector query failed during retrieval");
        })?;

        let results: Vec<RetrievalResult> = matches
            .into_iter()
            .map(|m| RetrievalResult {
                text: metadata_text(&m.metadata, TEXT_KEY),
                source: metadata_text(&m.metadata, SOURCE_KEY),
                date: metadata_text(&m.metadata, DATE_KEY),
                id: m.id,
                score: m.score,
                metadata: m.metadata,
            })
            .collect();

        info!(top_k, result_count = results.len(), "retrieval completed");
        Ok(results)
    }
}

/// Builder for constructing a [`RagPipeline`].
///
/// `embedder` and `vector_index` are required; `config` defaults to
/// [`RagConfig::default()`] and `provision_lock` to the process-wide
/// in-process lock.
#[derive(Default)]
pub struct RagPipelineBuilder {
    config: Option<RagConfig>,
    embedder: Option<Arc<dyn Embedder>>,
    vector_index: Option<Arc<dyn VectorIndex>>,
    provision_lock: Option<Arc<dyn ProvisionLock>>,
}

impl RagPipelineBuilder {
    /// Set the pipeline configuration.
    pub fn config(mut self, config: RagConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Set the embedder.
    pub fn embedder(mut self, embedder: Arc<dyn Embedder>) -> Self {
        self.embedder = Some(embedder);
        self
    }

    /// Set the vector index client.
    pub fn vector_index(mut self, index: Arc<dyn VectorIndex>) -> Self {
        self.vector_index = Some(index);
        self
    }

    /// Set the lock guarding index provisioning.
    pub fn provision_lock(mut self, lock: Arc<dyn ProvisionLock>) -> Self {
        self.provision_lock = Some(lock);
        self
    }

    /// Provision the index and build the [`RagPipeline`].
    ///
    /// # Errors
    ///
    /// - [`RagError::ConfigError`] if a required component is missing.
    /// - Any error from [`IndexManager::ensure_index`].
    pub async fn build(self) -> Result<RagPipeline> {
        let config = self.config.unwrap_or_default();
        let embedder = self
            .embedder
            .ok_or_else(|| RagError::ConfigError("embedder is required".to_string()))?;
        let vector_index = self
            .vector_index
            .ok_or_else(|| RagError::ConfigError("vector_index is required".to_string()))?;

        let mut manager =
            IndexManager::new(Arc::clone(&vector_index), config.cloud.clone(), config.region.clone());
        if let Some(lock) = self.provision_lock {
            manager = manager.with_lock(lock);
        }
        let handle = manager.ensure_index(&config.index_name, embedder.as_ref()).await?;

        Ok(RagPipeline { config, embedder, store: DocumentStore::new(vector_index, handle) })
    }
}
