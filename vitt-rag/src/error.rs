//! Error types for the `vitt-rag` crate.

use thiserror::Error;

/// Errors that can occur in retrieval operations.
///
/// None of these are recovered inside the crate. Every failure reaches the
/// immediate caller, which decides whether to retry or degrade.
#[derive(Debug, Error)]
pub enum RagError {
    /// The embedding model was unavailable or rejected the input.
    #[error("Embedding error ({provider}): {message}")]
    EmbeddingError {
        /// The embedder that produced the error.
        provider: String,
        /// A description of the failure.
        message: String,
    },

    /// Creating, describing, listing or deleting the remote index failed.
    #[error("Index provisioning error ({index}): {message}")]
    IndexProvisionError {
        /// The index being provisioned.
        index: String,
        /// A description of the failure.
        message: String,
    },

    /// An upsert was rejected by the transport or by schema validation.
    #[error("Store write error ({backend}): {message}")]
    StoreWriteError {
        /// The vector index backend that produced the error.
        backend: String,
        /// A description of the failure.
        message: String,
    },

    /// A similarity query failed.
    #[error("Store query error ({backend}): {message}")]
    StoreQueryError {
        /// The vector index backend that produced the error.
        backend: String,
        /// A description of the failure.
        message: String,
    },

    /// A caller supplied a malformed argument (e.g. `top_k == 0`).
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// A configuration validation error.
    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl RagError {
    /// Whether retrying the same call could succeed.
    ///
    /// Caller mistakes and configuration errors are deterministic and never
    /// retryable; everything that crosses a transport boundary is.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, RagError::InvalidArgument(_) | RagError::ConfigError(_))
    }
}

/// A convenience result type for retrieval operations.
pub type Result<T> = std::result::Result<T, RagError>;
