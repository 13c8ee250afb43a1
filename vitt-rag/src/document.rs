//! Data types for documents and retrieval results.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Document metadata: string keys to scalar or string JSON values.
pub type Metadata = serde_json::Map<String, Value>;

/// Metadata key that carries the document text through the index.
pub const TEXT_KEY: &str = "text";
/// Metadata key for provenance.
pub const SOURCE_KEY: &str = "source";
/// Metadata key for the ISO date of the document.
pub const DATE_KEY: &str = "date";

/// A financial document ready for indexing.
///
/// `metadata` should carry `source` and, when known, `date`. Any other
/// fields (document type, stock symbol, sentiment score, ...) are opaque to
/// the retrieval core and preserved verbatim.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Document {
    /// Unique identifier. A random UUID is assigned at indexing time when
    /// absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Text used both for embedding and as report context.
    pub text: String,
    /// Key-value metadata associated with the document.
    #[serde(default)]
    pub metadata: Metadata,
}

impl Document {
    /// Create a document with the given text and no metadata.
    pub fn new(text: impl Into<String>) -> Self {
        Self { id: None, text: text.into(), metadata: Metadata::new() }
    }

    /// Set an explicit id.
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Set the `source` metadata field.
    pub fn with_source(self, source: impl Into<String>) -> Self {
        self.with_field(SOURCE_KEY, source.into())
    }

    /// Set the `date` metadata field. `None` leaves it absent.
    pub fn with_date(self, date: Option<impl Into<String>>) -> Self {
        match date {
            Some(date) => self.with_field(DATE_KEY, date.into()),
            None => self,
        }
    }

    /// Set an arbitrary metadata field.
    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

/// A document returned by similarity search.
///
/// `text`, `source` and `date` are projected out of `metadata` for
/// convenience and default to `""` when the stored metadata lacks them.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RetrievalResult {
    /// Document id.
    pub id: String,
    /// Similarity score reported by the index (higher is more similar).
    pub score: f32,
    /// Document text.
    pub text: String,
    /// Provenance.
    pub source: String,
    /// ISO date, or `""`.
    pub date: String,
    /// The full stored metadata.
    pub metadata: Metadata,
}

/// Read a metadata field as display text. Missing and `null` values become
/// `""`; non-string scalars are rendered as their JSON text.
pub(crate) fn metadata_text(metadata: &Metadata, key: &str) -> String {
    match metadata.get(key) {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}
