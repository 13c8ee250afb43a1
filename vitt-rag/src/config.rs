//! Configuration for the retrieval pipeline.
//!
//! Everything here is supplied once at process start and never changes for
//! the lifetime of the process.

use serde::{Deserialize, Serialize};

use crate::error::{RagError, Result};
use crate::retry::RetryPolicy;

/// Report sections used when a structured report names none.
pub const DEFAULT_REPORT_SECTIONS: [&str; 6] = [
    "Executive Summary",
    "Market Overview",
    "Key Trends",
    "Financial Metrics",
    "Risk Analysis",
    "Recommendations",
];

/// Configuration parameters for the retrieval pipeline.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RagConfig {
    /// Name of the remote vector index.
    pub index_name: String,
    /// Identifier of the embedding model.
    pub embedding_model: String,
    /// Cloud provider for serverless index placement.
    pub cloud: String,
    /// Region for serverless index placement.
    pub region: String,
    /// Default number of documents returned by a retrieval.
    pub max_documents_retrieved: usize,
    /// Default section list for structured reports.
    pub report_sections: Vec<String>,
    /// Retry policy for opt-in retrying wrappers around remote calls.
    pub retry: RetryPolicy,
}

impl Default for RagConfig {
    fn default() -> Self {
        Self {
            index_name: "financial-research".to_string(),
            embedding_model: "hash-384".to_string(),
            cloud: "aws".to_string(),
            region: "us-east-1".to_string(),
            max_documents_retrieved: 5,
            report_sections: DEFAULT_REPORT_SECTIONS.iter().map(|s| s.to_string()).collect(),
            retry: RetryPolicy::default(),
        }
    }
}

impl RagConfig {
    /// Create a new builder for constructing a [`RagConfig`].
    pub fn builder() -> RagConfigBuilder {
        RagConfigBuilder::default()
    }

    /// Build a configuration from environment variables, falling back to the
    /// defaults for anything unset.
    ///
    /// | variable | field |
    /// |---|---|
    /// | `PINECONE_INDEX_NAME` | `index_name` |
    /// | `EMBEDDING_MODEL` | `embedding_model` |
    /// | `PINECONE_CLOUD` | `cloud` |
    /// | `PINECONE_ENVIRONMENT` | `region` |
    /// | `MAX_DOCUMENTS_RETRIEVED` | `max_documents_retrieved` |
    ///
    /// # Errors
    ///
    /// Returns [`RagError::ConfigError`] if `MAX_DOCUMENTS_RETRIEVED` is not a
    /// number or the resulting configuration fails validation.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Like [`from_env`](Self::from_env) with an explicit variable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut builder = Self::builder();
        if let Some(name) = lookup("PINECONE_INDEX_NAME") {
            builder = builder.index_name(name);
        }
        if let Some(model) = lookup("EMBEDDING_MODEL") {
            builder = builder.embedding_model(model);
        }
        if let Some(cloud) = lookup("PINECONE_CLOUD") {
            builder = builder.cloud(cloud);
        }
        if let Some(region) = lookup("PINECONE_ENVIRONMENT") {
            builder = builder.region(region);
        }
        if let Some(raw) = lookup("MAX_DOCUMENTS_RETRIEVED") {
            let top_k = raw.trim().parse::<usize>().map_err(|e| {
                RagError::ConfigError(format!("MAX_DOCUMENTS_RETRIEVED='{raw}' is invalid: {e}"))
            })?;
            builder = builder.max_documents_retrieved(top_k);
        }
        builder.build()
    }
}

/// Builder for constructing a validated [`RagConfig`].
#[derive(Debug, Clone, Default)]
pub struct RagConfigBuilder {
    config: RagConfig,
}

impl RagConfigBuilder {
    /// Set the index name.
    pub fn index_name(mut self, name: impl Into<String>) -> Self {
        self.config.index_name = name.into();
        self
    }

    /// Set the embedding model identifier.
    pub fn embedding_model(mut self, model: impl Into<String>) -> Self {
        self.config.embedding_model = model.into();
        self
    }

    /// Set the cloud provider for index placement.
    pub fn cloud(mut self, cloud: impl Into<String>) -> Self {
        self.config.cloud = cloud.into();
        self
    }

    /// Set the region for index placement.
    pub fn region(mut self, region: impl Into<String>) -> Self {
        self.config.region = region.into();
        self
    }

    /// Set the default number of documents returned by a retrieval.
    pub fn max_documents_retrieved(mut self, k: usize) -> Self {
        self.config.max_documents_retrieved = k;
        self
    }

    /// Set the default report sections.
    pub fn report_sections<I, S>(mut self, sections: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.config.report_sections = sections.into_iter().map(Into::into).collect();
        self
    }

    /// Set the retry policy.
    pub fn retry(mut self, retry: RetryPolicy) -> Self {
        self.config.retry = retry;
        self
    }

    /// Build the [`RagConfig`], validating that parameters are consistent.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::ConfigError`] if:
    /// - `index_name` or `embedding_model` is blank
    /// - `max_documents_retrieved == 0`
    /// - `report_sections` is empty
    pub fn build(self) -> Result<RagConfig> {
        if self.config.index_name.trim().is_empty() {
            return Err(RagError::ConfigError("index_name must not be empty".to_string()));
        }
        if self.config.embedding_model.trim().is_empty() {
            return Err(RagError::ConfigError("embedding_model must not be empty".to_string()));
        }
        if self.config.max_documents_retrieved == 0 {
            return Err(RagError::ConfigError(
                "max_documents_retrieved must be greater than zero".to_string(),
            ));
        }
        if self.config.report_sections.is_empty() {
            return Err(RagError::ConfigError("report_sections must not be empty".to_string()));
        }
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = RagConfig::builder().build().unwrap();
        assert_eq!(config.max_documents_retrieved, 5);
        assert_eq!(config.report_sections.len(), 6);
        assert_eq!(config.report_sections[0], "Executive Summary");
    }

    #[test]
    fn zero_top_k_is_rejected() {
        let err = RagConfig::builder().max_documents_retrieved(0).build().unwrap_err();
        assert!(matches!(err, RagError::ConfigError(_)));
    }

    #[test]
    fn empty_sections_are_rejected() {
        let err = RagConfig::builder().report_sections(Vec::<String>::new()).build().unwrap_err();
        assert!(matches!(err, RagError::ConfigError(_)));
    }

    #[test]
    fn reads_environment_lookup() {
        let vars: HashMap<&str, &str> = HashMap::from([
            ("PINECONE_INDEX_NAME", "vittsaar"),
            ("EMBEDDING_MODEL", "text-embedding-3-small"),
            ("PINECONE_ENVIRONMENT", "eu-west-1"),
            ("MAX_DOCUMENTS_RETRIEVED", "8"),
        ]);
        let config = RagConfig::from_lookup(|k| vars.get(k).map(|v| v.to_string())).unwrap();
        assert_eq!(config.index_name, "vittsaar");
        assert_eq!(config.embedding_model, "text-embedding-3-small");
        assert_eq!(config.cloud, "aws");
        assert_eq!(config.region, "eu-west-1");
        assert_eq!(config.max_documents_retrieved, 8);
    }

    #[test]
    fn non_numeric_top_k_is_a_config_error() {
        let err = RagConfig::from_lookup(|k| {
            (k == "MAX_DOCUMENTS_RETRIEVED").then(|| "five".to_string())
        })
        .unwrap_err();
        assert!(matches!(err, RagError::ConfigError(_)));
    }
}
