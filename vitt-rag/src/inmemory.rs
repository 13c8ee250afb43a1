//! In-memory vector index using cosine similarity.
//!
//! [`InMemoryVectorIndex`] keeps every index in a `HashMap` behind a
//! `tokio::sync::RwLock`. Writes are visible to the next query. It is meant
//! for development, tests and small local corpora.

use std::cmp::Ordering;
use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::debug;

use crate::document::Metadata;
use crate::error::{RagError, Result};
use crate::vectorstore::{IndexDescription, IndexSpec, Match, Metric, VectorIndex, VectorRecord};

const BACKEND: &str = "in-memory";

#[derive(Debug)]
struct StoredIndex {
    dimension: usize,
    metric: Metric,
    records: HashMap<String, (Vec<f32>, Metadata)>,
}

/// An in-memory [`VectorIndex`]. Only the cosine metric is supported.
///
/// # Example
///
/// ```rust,ignore
/// use vitt_rag::InMemoryVectorIndex;
///
/// let index = Arc::new(InMemoryVectorIndex::new());
/// let pipeline = RagPipeline::builder().vector_index(index).build().await?;
/// ```
#[derive(Debug, Default)]
pub struct InMemoryVectorIndex {
    indexes: RwLock<HashMap<String, StoredIndex>>,
}

impl InMemoryVectorIndex {
    /// Create a new empty in-memory index service.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of records held by `index`, if it exists.
    pub async fn record_count(&self, index: &str) -> Option<usize> {
        self.indexes.read().await.get(index).map(|stored| stored.records.len())
    }
}

/// Compute cosine similarity between two vectors.
///
/// Returns 0.0 if either vector has zero magnitude.
fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

fn provision_err(index: &str, message: impl Into<String>) -> RagError {
    RagError::IndexProvisionError { index: index.to_string(), message: message.into() }
}

#[async_trait]
impl VectorIndex for InMemoryVectorIndex {
    fn backend(&self) -> &str {
        BACKEND
    }

    async fn list_index_names(&self) -> Result<Vec<String>> {
        let mut names: Vec<String> = self.indexes.read().await.keys().cloned().collect();
        names.sort();
        Ok(names)
    }

    async fn create_index(&self, spec: &IndexSpec) -> Result<()> {
        if spec.metric != Metric::Cosine {
            return Err(provision_err(
                &spec.name,
                format!("metric '{}' is not supported in memory", spec.metric),
            ));
        }
        if spec.dimension == 0 {
            return Err(provision_err(&spec.name, "dimension must be greater than zero"));
        }
        let mut indexes = self.indexes.write().await;
        if indexes.contains_key(&spec.name) {
            return Err(provision_err(&spec.name, "index already exists"));
        }
        indexes.insert(
            spec.name.clone(),
            StoredIndex { dimension: spec.dimension, metric: spec.metric, records: HashMap::new() },
        );
        debug!(index = %spec.name, dimension = spec.dimension, "created in-memory index");
        Ok(())
    }

    async fn delete_index(&self, name: &str) -> Result<()> {
        self.indexes
            .write()
            .await
            .remove(name)
            .map(|_| debug!(index = name, "deleted in-memory index"))
            .ok_or_else(|| provision_err(name, "index does not exist"))
    }

    async fn describe_index(&self, name: &str) -> Result<IndexDescription> {
        let indexes = self.indexes.read().await;
        let stored = indexes.get(name).ok_or_else(|| provision_err(name, "index does not exist"))?;
        Ok(IndexDescription {
            name: name.to_string(),
            dimension: stored.dimension,
            metric: stored.metric,
        })
    }

    async fn upsert(&self, index: &str, records: &[VectorRecord]) -> Result<()> {
        let mut indexes = self.indexes.write().await;
        let stored = indexes.get_mut(index).ok_or_else(|| RagError::StoreWriteError {
            backend: BACKEND.to_string(),
            message: format!("index '{index}' does not exist"),
        })?;
        // Validate the whole batch before touching any record.
        if let Some(bad) = records.iter().find(|r| r.values.len() != stored.dimension) {
            return Err(RagError::StoreWriteError {
                backend: BACKEND.to_string(),
                message: format!(
                    "vector dimension {} for id '{}' does not match index dimension {}",
                    bad.values.len(),
                    bad.id,
                    stored.dimension
                ),
            });
        }
        for record in records {
            stored.records.insert(record.id.clone(), (record.values.clone(), record.metadata.clone()));
        }
        Ok(())
    }

    async fn query(
        &self,
        index: &str,
        vector: &[f32],
        top_k: usize,
        include_metadata: bool,
    ) -> Result<Vec<Match>> {
        let indexes = self.indexes.read().await;
        let stored = indexes.get(index).ok_or_else(|| RagError::StoreQueryError {
            backend: BACKEND.to_string(),
            message: format!("index '{index}' does not exist"),
        })?;
        if vector.len() != stored.dimension {
            return Err(RagError::StoreQueryError {
                backend: BACKEND.to_string(),
                message: format!(
                    "query dimension {} does not match index dimension {}",
                    vector.len(),
                    stored.dimension
                ),
            });
        }

        let mut scored: Vec<Match> = stored
            .records
            .iter()
            .map(|(id, (values, metadata))| Match {
                id: id.clone(),
                score: cosine_similarity(values, vector),
                metadata: if include_metadata { metadata.clone() } else { Metadata::new() },
            })
            .collect();

        scored.sort_by(|a, b| {
            b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal).then_with(|| a.id.cmp(&b.id))
        });
        scored.truncate(top_k);
        Ok(scored)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn spec(name: &str, dimension: usize) -> IndexSpec {
        IndexSpec {
            name: name.into(),
            dimension,
            metric: Metric::Cosine,
            cloud: "aws".into(),
            region: "us-east-1".into(),
        }
    }

    fn record(id: &str, values: Vec<f32>) -> VectorRecord {
        let mut metadata = Metadata::new();
        metadata.insert("text".into(), json!(id));
        VectorRecord { id: id.into(), values, metadata }
    }

    #[tokio::test]
    async fn create_describe_delete() {
        let index = InMemoryVectorIndex::new();
        index.create_index(&spec("a", 3)).await.unwrap();
        assert_eq!(index.list_index_names().await.unwrap(), vec!["a".to_string()]);
        assert_eq!(index.describe_index("a").await.unwrap().dimension, 3);
        index.delete_index("a").await.unwrap();
        assert!(index.list_index_names().await.unwrap().is_empty());
        assert!(matches!(
            index.describe_index("a").await,
            Err(RagError::IndexProvisionError { .. })
        ));
    }

    #[tokio::test]
    async fn duplicate_create_is_rejected() {
        let index = InMemoryVectorIndex::new();
        index.create_index(&spec("a", 3)).await.unwrap();
        assert!(matches!(
            index.create_index(&spec("a", 3)).await,
            Err(RagError::IndexProvisionError { .. })
        ));
    }

    #[tokio::test]
    async fn upsert_rejects_wrong_dimension() {
        let index = InMemoryVectorIndex::new();
        index.create_index(&spec("a", 3)).await.unwrap();
        let err = index.upsert("a", &[record("x", vec![1.0, 0.0])]).await.unwrap_err();
        assert!(matches!(err, RagError::StoreWriteError { .. }));
        assert_eq!(index.record_count("a").await, Some(0));
    }

    #[tokio::test]
    async fn query_orders_by_score_and_truncates() {
        let index = InMemoryVectorIndex::new();
        index.create_index(&spec("a", 2)).await.unwrap();
        index
            .upsert(
                "a",
                &[
                    record("far", vec![-1.0, 0.0]),
                    record("near", vec![1.0, 0.1]),
                    record("mid", vec![0.0, 1.0]),
                ],
            )
            .await
            .unwrap();

        let matches = index.query("a", &[1.0, 0.0], 2, true).await.unwrap();
        let ids: Vec<&str> = matches.iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, vec!["near", "mid"]);
        assert_eq!(matches[0].metadata["text"], json!("near"));
    }

    #[tokio::test]
    async fn query_without_metadata_returns_empty_maps() {
        let index = InMemoryVectorIndex::new();
        index.create_index(&spec("a", 2)).await.unwrap();
        index.upsert("a", &[record("x", vec![1.0, 0.0])]).await.unwrap();
        let matches = index.query("a", &[1.0, 0.0], 1, false).await.unwrap();
        assert!(matches[0].metadata.is_empty());
    }

    #[tokio::test]
    async fn empty_index_yields_no_matches() {
        let index = InMemoryVectorIndex::new();
        index.create_index(&spec("a", 2)).await.unwrap();
        assert!(index.query("a", &[1.0, 0.0], 5, true).await.unwrap().is_empty());
    }
}
