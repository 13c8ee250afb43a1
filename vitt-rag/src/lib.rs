//! # vitt-rag
//!
//! Retrieval core for VittSaar financial research reports.
//!
//! ## Overview
//!
//! Financial news, sentiment and stock records are embedded into vectors,
//! stored in a named similarity index, and retrieved by semantic similarity
//! to a natural-language query. Retrieved passages ground the report
//! synthesizer in `vitt-report`.
//!
//! - [`Embedder`] - text to fixed-dimension vector ([`HashEmbedder`],
//!   `openai::OpenAIEmbedder`)
//! - [`VectorIndex`] - control and data plane of a similarity service
//!   ([`InMemoryVectorIndex`], `pinecone::PineconeIndex`)
//! - [`IndexManager`] - creates the index, or drops and recreates it when
//!   the embedder's dimension changes
//! - [`DocumentStore`] - upsert/query over one provisioned index
//! - [`RagPipeline`] - `index_document` and `retrieve_relevant_documents`
//! - [`SourceRecord`] - typed upstream records converted to [`Document`]s
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use vitt_rag::{Document, HashEmbedder, InMemoryVectorIndex, RagConfig, RagPipeline};
//!
//! let pipeline = RagPipeline::builder()
//!     .config(RagConfig::from_env()?)
//!     .embedder(Arc::new(HashEmbedder::new(384)))
//!     .vector_index(Arc::new(InMemoryVectorIndex::new()))
//!     .build()
//!     .await?;
//!
//! pipeline.index_document(Document::new("Infosys raises FY guidance").with_source("Reuters")).await?;
//! for hit in pipeline.retrieve_relevant_documents("Infosys outlook", Some(3)).await? {
//!     println!("{:.3} {}", hit.score, hit.text);
//! }
//! ```
//!
//! ## Features
//!
//! | Feature | Description |
//! |---------|-------------|
//! | `openai` | OpenAI-compatible embeddings endpoint |
//! | `pinecone` | Pinecone serverless index over REST |
//! | `full` | Everything above |

pub mod config;
pub mod document;
pub mod embedding;
pub mod error;
pub mod index;
pub mod inmemory;
pub mod lock;
pub mod pipeline;
pub mod retry;
pub mod source;
pub mod store;
pub mod vectorstore;

#[cfg(feature = "openai")]
pub mod openai;
#[cfg(feature = "pinecone")]
pub mod pinecone;

pub use config::{DEFAULT_REPORT_SECTIONS, RagConfig, RagConfigBuilder};
pub use document::{DATE_KEY, Document, Metadata, RetrievalResult, SOURCE_KEY, TEXT_KEY};
pub use embedding::{Embedder, HashEmbedder};
pub use error::{RagError, Result};
pub use index::{IndexHandle, IndexManager, SENTINEL_TEXT};
pub use inmemory::InMemoryVectorIndex;
pub use lock::{InProcessLock, LockFile, ProvisionGuard, ProvisionLock};
pub use pipeline::{RagPipeline, RagPipelineBuilder};
pub use retry::{RetryPolicy, RetryingVectorIndex, retry_with_backoff};
pub use source::{
    Entity, NewsArticle, Sentiment, SentimentArticle, SourceRecord, StockForecast, StockNewsArticle,
    StockSnapshot,
};
pub use store::DocumentStore;
pub use vectorstore::{IndexDescription, IndexSpec, Match, Metric, VectorIndex, VectorRecord};

#[cfg(feature = "openai")]
pub use openai::OpenAIEmbedder;
#[cfg(feature = "pinecone")]
pub use pinecone::PineconeIndex;
