//! # vitt-report
//!
//! Financial research report synthesis on top of `vitt-rag`.
//!
//! ## Overview
//!
//! [`ReportSynthesizer`] retrieves the documents most relevant to a query
//! and asks a [`GenerativeModel`] to write a report grounded on them,
//! either as one narrative or section by section.
//!
//! - [`GeminiModel`] - Google's Gemini models over REST (feature `gemini`)
//! - [`MockModel`] - scripted responses for tests and offline runs
//! - [`RetryingModel`] - bounded retry with backoff around any model
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use vitt_report::{GeminiModel, ReportRequest, ReportSynthesizer};
//!
//! let synthesizer = ReportSynthesizer::new(Arc::new(pipeline), Arc::new(GeminiModel::from_env()?));
//! let report = synthesizer
//!     .generate_report(&ReportRequest::new("Reliance Q3 results").with_sections(["Summary", "Risks"]))
//!     .await?;
//! println!("{}", serde_json::to_string_pretty(&report)?);
//! ```

pub mod error;
#[cfg(feature = "gemini")]
pub mod gemini;
pub mod mock;
pub mod model;
pub mod prompt;
pub mod report;

pub use error::{ReportError, Result};
#[cfg(feature = "gemini")]
pub use gemini::GeminiModel;
pub use mock::MockModel;
pub use model::{GenerativeModel, RetryingModel};
pub use report::{Report, ReportContent, ReportRequest, ReportSection, ReportSynthesizer, SourceRef};
