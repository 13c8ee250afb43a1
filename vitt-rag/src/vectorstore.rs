//! Remote vector index boundary.
//!
//! [`VectorIndex`] is the client surface of a similarity-search service:
//! control-plane calls that manage named indexes, and data-plane calls that
//! upsert and query vectors inside one index. Backends map their failures
//! onto the matching [`RagError`](crate::RagError) variant: control-plane
//! calls fail with `IndexProvisionError`, upserts with `StoreWriteError`,
//! queries with `StoreQueryError`.

use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::document::Metadata;
use crate::error::Result;

/// Distance metric of an index.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Metric {
    /// Cosine similarity; higher is more similar.
    #[default]
    Cosine,
    /// Euclidean distance.
    Euclidean,
    /// Dot product.
    #[serde(rename = "dotproduct")]
    DotProduct,
}

impl Metric {
    /// The wire name of the metric.
    pub fn as_str(&self) -> &'static str {
        match self {
            Metric::Cosine => "cosine",
            Metric::Euclidean => "euclidean",
            Metric::DotProduct => "dotproduct",
        }
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Everything needed to create an index.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct IndexSpec {
    /// Index name.
    pub name: String,
    /// Vector dimension.
    pub dimension: usize,
    /// Distance metric.
    pub metric: Metric,
    /// Cloud provider for serverless placement (e.g. `aws`).
    pub cloud: String,
    /// Region for serverless placement (e.g. `us-east-1`).
    pub region: String,
}

/// What the service reports about an existing index.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct IndexDescription {
    /// Index name.
    pub name: String,
    /// Vector dimension fixed at creation time.
    pub dimension: usize,
    /// Distance metric.
    pub metric: Metric,
}

/// A vector and its metadata, keyed by id.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VectorRecord {
    /// Record id. Upserting an existing id overwrites it.
    pub id: String,
    /// The embedding.
    pub values: Vec<f32>,
    /// Metadata returned alongside query matches.
    pub metadata: Metadata,
}

/// One result of a similarity query.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Match {
    /// The matched record id.
    pub id: String,
    /// Similarity score (higher is more similar under cosine).
    pub score: f32,
    /// Stored metadata; empty when metadata was not requested.
    #[serde(default)]
    pub metadata: Metadata,
}

/// A client for a remote similarity-search service.
///
/// # Example
///
/// ```rust,ignore
/// use vitt_rag::{InMemoryVectorIndex, IndexSpec, Metric, VectorIndex};
///
/// let index = InMemoryVectorIndex::new();
/// index.create_index(&IndexSpec { name: "filings".into(), dimension: 384, metric: Metric::Cosine, .. }).await?;
/// index.upsert("filings", &records).await?;
/// let matches = index.query("filings", &query_vector, 5, true).await?;
/// ```
#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Short backend name used in errors and logs.
    fn backend(&self) -> &str;

    /// Names of all indexes visible to this client.
    async fn list_index_names(&self) -> Result<Vec<String>>;

    /// Create an index. Fails if the service rejects the [`IndexSpec`].
    async fn create_index(&self, spec: &IndexSpec) -> Result<()>;

    /// Drop an index and every vector in it.
    async fn delete_index(&self, name: &str) -> Result<()>;

    /// Describe an existing index.
    async fn describe_index(&self, name: &str) -> Result<IndexDescription>;

    /// Insert or overwrite records by id.
    async fn upsert(&self, index: &str, records: &[VectorRecord]) -> Result<()>;

    /// Return up to `top_k` matches ordered by descending score.
    ///
    /// An index holding no vectors yields an empty `Vec`, not an error.
    async fn query(
        &self,
        index: &str,
        vector: &[f32],
        top_k: usize,
        include_metadata: bool,
    ) -> Result<Vec<Match>>;
}
