//! Error types for the `vitt-report` crate.

use thiserror::Error;
use vitt_rag::RagError;

/// Errors that can occur while synthesizing a report.
#[derive(Debug, Error)]
pub enum ReportError {
    /// The generative model failed or returned unusable output.
    #[error("Generation error ({model}): {message}")]
    Generation {
        /// The model that produced the error.
        model: String,
        /// A description of the failure.
        message: String,
    },

    /// Retrieving the grounding documents failed.
    #[error("Retrieval failed: {0}")]
    Retrieval(#[from] RagError),

    /// A caller supplied a malformed request.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
}

impl ReportError {
    /// Whether retrying the same call could succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            ReportError::Generation { .. } => true,
            ReportError::Retrieval(e) => e.is_retryable(),
            ReportError::InvalidArgument(_) => false,
        }
    }
}

/// A convenience result type for report operations.
pub type Result<T> = std::result::Result<T, ReportError>;
