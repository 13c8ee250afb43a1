//! Pinecone vector index backend.
//!
//! Provides [`PineconeIndex`], which implements [`VectorIndex`] over the
//! Pinecone REST API with [reqwest](https://docs.rs/reqwest). Control-plane
//! calls go to `https://api.pinecone.io`; data-plane calls go to the
//! per-index host reported by `describe_index`, cached per index name.
//!
//! Serverless indexes are eventually consistent: a vector upserted a moment
//! ago may be missing from the next query.
//!
//! This module is only available when the `pinecone` feature is enabled.
//!
//! # Example
//!
//! ```rust,ignore
//! use vitt_rag::pinecone::PineconeIndex;
//!
//! let index = PineconeIndex::new(std::env::var("PINECONE_API_KEY")?)?;
//! let names = index.list_index_names().await?;
//! ```

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::{RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::RwLock;
use tracing::{debug, error};

use crate::document::Metadata;
use crate::error::{RagError, Result};
use crate::vectorstore::{IndexDescription, IndexSpec, Match, Metric, VectorIndex, VectorRecord};

const BACKEND: &str = "pinecone";

/// The default Pinecone control-plane URL.
const CONTROL_PLANE_URL: &str = "https://api.pinecone.io";

/// The REST API version sent with every request.
const API_VERSION: &str = "2024-07";

/// A [`VectorIndex`] backed by [Pinecone](https://www.pinecone.io/).
pub struct PineconeIndex {
    client: reqwest::Client,
    api_key: String,
    control_url: String,
    hosts: RwLock<HashMap<String, String>>,
    ready_timeout: Duration,
    poll_interval: Duration,
}

impl PineconeIndex {
    /// Create a client for the default control plane.
    pub fn new(api_key: impl Into<String>) -> Result<Self> {
        let api_key = api_key.into();
        if api_key.is_empty() {
            return Err(RagError::ConfigError("Pinecone API key must not be empty".into()));
        }
        Ok(Self {
            client: reqwest::Client::new(),
            api_key,
            control_url: CONTROL_PLANE_URL.to_string(),
            hosts: RwLock::new(HashMap::new()),
            ready_timeout: Duration::from_secs(120),
            poll_interval: Duration::from_secs(1),
        })
    }

    /// Override the control-plane URL.
    pub fn with_control_url(mut self, url: impl Into<String>) -> Self {
        self.control_url = url.into().trim_end_matches('/').to_string();
        self
    }

    /// How long `create_index` / `delete_index` wait for the service to
    /// finish the operation, and how often they check.
    pub fn with_ready_wait(mut self, timeout: Duration, poll_interval: Duration) -> Self {
        self.ready_timeout = timeout;
        self.poll_interval = poll_interval;
        self
    }

    fn request(&self, builder: RequestBuilder) -> RequestBuilder {
        builder.header("Api-Key", &self.api_key).header("X-Pinecone-API-Version", API_VERSION)
    }

    /// Send a request and decode a JSON body, or describe why not.
    async fn call<T: DeserializeOwned>(&self, builder: RequestBuilder) -> std::result::Result<T, String> {
        let response = self.send(builder).await?;
        response.json::<T>().await.map_err(|e| format!("failed to parse response: {e}"))
    }

    /// Send a request and require a success status.
    async fn send(&self, builder: RequestBuilder) -> std::result::Result<reqwest::Response, String> {
        let response =
            self.request(builder).send().await.map_err(|e| format!("request failed: {e}"))?;
        Self::check(response).await
    }

    async fn check(response: reqwest::Response) -> std::result::Result<reqwest::Response, String> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        let detail = serde_json::from_str::<ErrorResponse>(&body)
            .map(|e| e.error.message)
            .unwrap_or(body);
        error!(backend = BACKEND, %status, "API error");
        Err(format!("API returned {status}: {detail}"))
    }

    fn provision_err(index: &str, message: String) -> RagError {
        RagError::IndexProvisionError { index: index.to_string(), message }
    }

    async fn fetch_description(&self, name: &str) -> std::result::Result<IndexModel, String> {
        let model: IndexModel =
            self.call(self.client.get(format!("{}/indexes/{name}", self.control_url))).await?;
        if let Some(host) = &model.host {
            self.hosts.write().await.insert(name.to_string(), data_plane_url(host));
        }
        Ok(model)
    }

    /// Resolve the data-plane URL of `index`, describing it on first use.
    async fn host(&self, index: &str) -> std::result::Result<String, String> {
        if let Some(host) = self.hosts.read().await.get(index) {
            return Ok(host.clone());
        }
        let model = self.fetch_description(index).await?;
        model.host.map(|h| data_plane_url(&h)).ok_or_else(|| format!("index '{index}' has no host yet"))
    }

    async fn wait_until<F, Fut>(&self, index: &str, what: &str, mut done: F) -> Result<()>
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = std::result::Result<bool, String>>,
    {
        let started = Instant::now();
        loop {
            match done().await {
                Ok(true) => return Ok(()),
                Ok(false) => {}
                Err(message) => return Err(Self::provision_err(index, message)),
            }
            if started.elapsed() >= self.ready_timeout {
                return Err(Self::provision_err(
                    index,
                    format!("timed out after {:?} waiting for index to {what}", self.ready_timeout),
                ));
            }
            tokio::time::sleep(self.poll_interval).await;
        }
    }
}

/// Data-plane hosts come back without a scheme.
fn data_plane_url(host: &str) -> String {
    if host.starts_with("http://") || host.starts_with("https://") {
        host.trim_end_matches('/').to_string()
    } else {
        format!("https://{}", host.trim_end_matches('/'))
    }
}

/// Pinecone metadata accepts strings, numbers, booleans and lists of
/// strings. Nulls are dropped; anything else is stored as JSON text.
fn to_pinecone_metadata(metadata: &Metadata) -> Metadata {
    metadata
        .iter()
        .filter_map(|(key, value)| {
            let value = match value {
                Value::Null => return None,
                Value::Array(items) if items.iter().all(Value::is_string) => value.clone(),
                Value::Array(_) | Value::Object(_) => Value::String(value.to_string()),
                scalar => scalar.clone(),
            };
            Some((key.clone(), value))
        })
        .collect()
}

// ── Pinecone API request/response types ────────────────────────────

#[derive(Deserialize)]
struct IndexList {
    #[serde(default)]
    indexes: Vec<IndexModel>,
}

#[derive(Deserialize)]
struct IndexModel {
    name: String,
    dimension: usize,
    metric: Metric,
    host: Option<String>,
    #[serde(default)]
    status: IndexStatus,
}

#[derive(Deserialize, Default)]
struct IndexStatus {
    #[serde(default)]
    ready: bool,
}

#[derive(Serialize)]
struct CreateIndexRequest<'a> {
    name: &'a str,
    dimension: usize,
    metric: Metric,
    spec: ServerlessSpec<'a>,
}

#[derive(Serialize)]
struct ServerlessSpec<'a> {
    serverless: CloudPlacement<'a>,
}

#[derive(Serialize)]
struct CloudPlacement<'a> {
    cloud: &'a str,
    region: &'a str,
}

#[derive(Serialize)]
struct UpsertRequest<'a> {
    vectors: Vec<UpsertVector<'a>>,
}

#[derive(Serialize)]
struct UpsertVector<'a> {
    id: &'a str,
    values: &'a [f32],
    metadata: Metadata,
}

#[derive(Deserialize)]
struct UpsertResponse {
    #[serde(rename = "upsertedCount", default)]
    upserted_count: usize,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct QueryRequest<'a> {
    vector: &'a [f32],
    top_k: usize,
    include_metadata: bool,
    include_values: bool,
}

#[derive(Deserialize)]
struct QueryResponse {
    #[serde(default)]
    matches: Vec<Match>,
}

#[derive(Deserialize)]
struct ErrorResponse {
    error: ErrorDetail,
}

#[derive(Deserialize)]
struct ErrorDetail {
    message: String,
}

// ── VectorIndex implementation ─────────────────────────────────────

#[async_trait]
impl VectorIndex for PineconeIndex {
    fn backend(&self) -> &str {
        BACKEND
    }

    async fn list_index_names(&self) -> Result<Vec<String>> {
        let list: IndexList = self
            .call(self.client.get(format!("{}/indexes", self.control_url)))
            .await
            .map_err(|m| Self::provision_err("*", m))?;
        Ok(list.indexes.into_iter().map(|i| i.name).collect())
    }

    async fn create_index(&self, spec: &IndexSpec) -> Result<()> {
        let body = CreateIndexRequest {
            name: &spec.name,
            dimension: spec.dimension,
            metric: spec.metric,
            spec: ServerlessSpec {
                serverless: CloudPlacement { cloud: &spec.cloud, region: &spec.region },
            },
        };
        let response = self
            .request(self.client.post(format!("{}/indexes", self.control_url)).json(&body))
            .send()
            .await
            .map_err(|e| Self::provision_err(&spec.name, format!("request failed: {e}")))?;
        // A 409 means an earlier attempt got through; wait for that index instead.
        if response.status() == StatusCode::CONFLICT {
            debug!(index = %spec.name, "pinecone index already exists, waiting for it");
        } else {
            Self::check(response).await.map_err(|m| Self::provision_err(&spec.name, m))?;
            debug!(index = %spec.name, dimension = spec.dimension, "requested pinecone index creation");
        }

        let dimension = AtomicUsize::new(spec.dimension);
        self.wait_until(&spec.name, "become ready", || async {
            let model = self.fetch_description(&spec.name).await?;
            dimension.store(model.dimension, Ordering::Relaxed);
            Ok::<_, String>(model.status.ready)
        })
        .await?;
        let dimension = dimension.into_inner();
        if dimension != spec.dimension {
            return Err(Self::provision_err(
                &spec.name,
                format!("index already exists with dimension {dimension}, expected {}", spec.dimension),
            ));
        }
        debug!(index = %spec.name, "pinecone index is ready");
        Ok(())
    }

    async fn delete_index(&self, name: &str) -> Result<()> {
        self.send(self.client.delete(format!("{}/indexes/{name}", self.control_url)))
            .await
            .map_err(|m| Self::provision_err(name, m))?;
        self.hosts.write().await.remove(name);

        self.wait_until(name, "disappear", || async {
            let response = self
                .request(self.client.get(format!("{}/indexes/{name}", self.control_url)))
                .send()
                .await
                .map_err(|e| format!("request failed: {e}"))?;
            Ok::<_, String>(response.status() == StatusCode::NOT_FOUND)
        })
        .await?;
        debug!(index = name, "deleted pinecone index");
        Ok(())
    }

    async fn describe_index(&self, name: &str) -> Result<IndexDescription> {
        let model = self.fetch_description(name).await.map_err(|m| Self::provision_err(name, m))?;
        Ok(IndexDescription { name: model.name, dimension: model.dimension, metric: model.metric })
    }

    async fn upsert(&self, index: &str, records: &[VectorRecord]) -> Result<()> {
        if records.is_empty() {
            return Ok(());
        }
        let write_err =
            |message: String| RagError::StoreWriteError { backend: BACKEND.to_string(), message };

        let host = self.host(index).await.map_err(write_err)?;
        let body = UpsertRequest {
            vectors: records
                .iter()
                .map(|r| UpsertVector {
                    id: &r.id,
                    values: &r.values,
                    metadata: to_pinecone_metadata(&r.metadata),
                })
                .collect(),
        };
        let response: UpsertResponse = self
            .call(self.client.post(format!("{host}/vectors/upsert")).json(&body))
            .await
            .map_err(write_err)?;

        debug!(index, count = response.upserted_count, "upserted vectors to pinecone");
        Ok(())
    }

    async fn query(
        &self,
        index: &str,
        vector: &[f32],
        top_k: usize,
        include_metadata: bool,
    ) -> Result<Vec<Match>> {
        let query_err =
            |message: String| RagError::StoreQueryError { backend: BACKEND.to_string(), message };

        let host = self.host(index).await.map_err(query_err)?;
        let body = QueryRequest { vector, top_k, include_metadata, include_values: false };
        let response: QueryResponse = self
            .call(self.client.post(format!("{host}/query")).json(&body))
            .await
            .map_err(query_err)?;

        debug!(index, top_k, match_count = response.matches.len(), "queried pinecone");
        Ok(response.matches)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn host_gets_https_scheme() {
        assert_eq!(data_plane_url("idx-abc.svc.pinecone.io"), "https://idx-abc.svc.pinecone.io");
        assert_eq!(data_plane_url("http://127.0.0.1:9000/"), "http://127.0.0.1:9000");
    }

    #[test]
    fn metadata_is_made_pinecone_safe() {
        let mut metadata = Metadata::new();
        metadata.insert("text".into(), json!("hello"));
        metadata.insert("date".into(), Value::Null);
        metadata.insert("score".into(), json!(0.4));
        metadata.insert("tags".into(), json!(["a", "b"]));
        metadata.insert("mixed".into(), json!([1, "b"]));
        metadata.insert("raw".into(), json!({"pe": 21.5}));

        let safe = to_pinecone_metadata(&metadata);
        assert!(!safe.contains_key("date"));
        assert_eq!(safe["text"], json!("hello"));
        assert_eq!(safe["score"], json!(0.4));
        assert_eq!(safe["tags"], json!(["a", "b"]));
        assert_eq!(safe["mixed"], json!("[1,\"b\"]"));
        assert_eq!(safe["raw"], json!("{\"pe\":21.5}"));
    }

    #[test]
    fn empty_api_key_is_rejected() {
        assert!(matches!(PineconeIndex::new(""), Err(RagError::ConfigError(_))));
    }
}
