//! Report synthesis: retrieve grounding documents, then generate text.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};
use vitt_rag::{RagPipeline, RetrievalResult};

use crate::error::{ReportError, Result};
use crate::model::GenerativeModel;
use crate::prompt;

fn default_report_type() -> String {
    "general".to_string()
}

fn default_structured() -> bool {
    true
}

/// What to write a report about.
///
/// Deserializes with the same defaults as [`ReportRequest::new`], so a
/// request body of `{"query": "..."}` is enough.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ReportRequest {
    /// The research question; also the retrieval query.
    pub query: String,
    /// Analysis flavour passed into the prompt (e.g. `equity`).
    #[serde(default = "default_report_type")]
    pub report_type: String,
    /// One model call per section when `true`, a single narrative otherwise.
    #[serde(default = "default_structured")]
    pub structured: bool,
    /// Sections for a structured report; the configured list when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sections: Option<Vec<String>>,
    /// Documents to retrieve; the configured default when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_k: Option<usize>,
}

impl ReportRequest {
    /// A structured `general` report using the configured sections.
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            report_type: default_report_type(),
            structured: default_structured(),
            sections: None,
            top_k: None,
        }
    }

    pub fn with_report_type(mut self, report_type: impl Into<String>) -> Self {
        self.report_type = report_type.into();
        self
    }

    /// Generate one free-form narrative instead of sections.
    pub fn narrative(mut self) -> Self {
        self.structured = false;
        self
    }

    pub fn with_sections<I, S>(mut self, sections: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.sections = Some(sections.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = Some(top_k);
        self
    }
}

/// One generated section of a structured report.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ReportSection {
    pub title: String,
    pub content: String,
}

/// Generated report body.
///
/// A structured report serializes as a JSON object from section title to
/// text, with keys in request order.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum ReportContent {
    /// A single free-form report.
    Narrative(String),
    /// Sections in request order.
    Sections(#[serde(with = "section_map")] Vec<ReportSection>),
}

impl ReportContent {
    /// Text of the section titled `title`, if this is a structured report.
    pub fn section(&self, title: &str) -> Option<&str> {
        match self {
            ReportContent::Sections(sections) => {
                sections.iter().find(|s| s.title == title).map(|s| s.content.as_str())
            }
            ReportContent::Narrative(_) => None,
        }
    }
}

/// A document the report was grounded on.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SourceRef {
    pub id: String,
    pub source: String,
    pub date: String,
    pub relevance_score: f32,
}

impl From<&RetrievalResult> for SourceRef {
    fn from(result: &RetrievalResult) -> Self {
        Self {
            id: result.id.clone(),
            source: result.source.clone(),
            date: result.date.clone(),
            relevance_score: result.score,
        }
    }
}

/// A finished report. Sources are listed in retrieval order.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Report {
    pub query: String,
    pub report_type: String,
    pub content: ReportContent,
    pub sources: Vec<SourceRef>,
}

/// Turns a query into a report grounded on retrieved documents.
///
/// # Example
///
/// ```rust,ignore
/// use vitt_report::{ReportRequest, ReportSynthesizer};
///
/// let synthesizer = ReportSynthesizer::new(pipeline, Arc::new(GeminiModel::from_env()?));
/// let report = synthesizer
///     .generate_report(&ReportRequest::new("Outlook for Indian IT services").with_report_type("equity"))
///     .await?;
/// ```
pub struct ReportSynthesizer {
    pipeline: Arc<RagPipeline>,
    model: Arc<dyn GenerativeModel>,
}

impl ReportSynthesizer {
    pub fn new(pipeline: Arc<RagPipeline>, model: Arc<dyn GenerativeModel>) -> Self {
        Self { pipeline, model }
    }

    pub fn pipeline(&self) -> &Arc<RagPipeline> {
        &self.pipeline
    }

    /// Retrieve documents for the query and generate the report.
    ///
    /// Structured reports are all-or-nothing: sections are generated one at
    /// a time in order, and the first failing section aborts the report.
    /// Sections already generated are discarded.
    ///
    /// # Errors
    ///
    /// - [`ReportError::InvalidArgument`] for a blank query or an empty
    ///   section list.
    /// - [`ReportError::Retrieval`] if retrieval fails.
    /// - [`ReportError::Generation`] if any model call fails.
    pub async fn generate_report(&self, request: &ReportRequest) -> Result<Report> {
        if request.query.trim().is_empty() {
            return Err(ReportError::InvalidArgument("query must not be empty".to_string()));
        }
        let sections: Option<&[String]> = if request.structured {
            let sections = request
                .sections
                .as_deref()
                .unwrap_or(&self.pipeline.config().report_sections);
            if sections.is_empty() {
                return Err(ReportError::InvalidArgument(
                    "structured report needs at least one section".to_string(),
                ));
            }
            Some(sections)
        } else {
            None
        };

        let results =
            self.pipeline.retrieve_relevant_documents(&request.query, request.top_k).await?;
        if results.is_empty() {
            warn!(query = %request.query, "no documents retrieved; report is ungrounded");
        }
        let context: Vec<&str> = results.iter().map(|r| r.text.as_str()).collect();

        let content = match sections {
            Some(sections) => {
                let mut generated = Vec::with_capacity(sections.len());
                for section in sections {
                    let prompt = prompt::section_prompt(
                        &request.query,
                        &context,
                        &request.report_type,
                        section,
                    );
                    let text = self.model.generate(&prompt).await.inspect_err(|e| {
                        error!(
                            model = self.model.name(),
                            section = %section,
                            completed = generated.len(),
                            error = %e,
                            "section generation failed; discarding report"
                        );
                    })?;
                    generated.push(ReportSection { title: section.clone(), content: text });
                }
                ReportContent::Sections(generated)
            }
            None => {
                let prompt = prompt::narrative_prompt(&request.query, &context, &request.report_type);
                let text = self.model.generate(&prompt).await.inspect_err(|e| {
                    error!(model = self.model.name(), error = %e, "report generation failed");
                })?;
                ReportContent::Narrative(text)
            }
        };

        info!(
            query = %request.query,
            report_type = %request.report_type,
            source_count = results.len(),
            model = self.model.name(),
            "report generated"
        );
        Ok(Report {
            query: request.query.clone(),
            report_type: request.report_type.clone(),
            content,
            sources: results.iter().map(SourceRef::from).collect(),
        })
    }
}

/// (De)serializes sections as a `{title: content}` object without losing
/// their order.
mod section_map {
    use std::fmt;

    use serde::de::{MapAccess, Visitor};
    use serde::ser::SerializeMap;
    use serde::{Deserializer, Serializer};

    use super::ReportSection;

    pub fn serialize<S: Serializer>(sections: &[ReportSection], s: S) -> Result<S::Ok, S::Error> {
        let mut map = s.serialize_map(Some(sections.len()))?;
        for section in sections {
            map.serialize_entry(&section.title, &section.content)?;
        }
        map.end()
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<ReportSection>, D::Error> {
        struct SectionsVisitor;

        impl<'de> Visitor<'de> for SectionsVisitor {
            type Value = Vec<ReportSection>;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a map from section title to text")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
                let mut sections = Vec::with_capacity(access.size_hint().unwrap_or(0));
                while let Some((title, content)) = access.next_entry::<String, String>()? {
                    sections.push(ReportSection { title, content });
                }
                Ok(sections)
            }
        }

        d.deserialize_map(SectionsVisitor)
    }
}
