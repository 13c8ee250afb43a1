//! Gemini generative model over the REST `generateContent` endpoint.
//!
//! This module is only available when the `gemini` feature is enabled.
//!
//! # Example
//!
//! ```rust,ignore
//! use vitt_report::gemini::GeminiModel;
//!
//! let model = GeminiModel::from_env()?.with_model("gemini-1.5-pro");
//! let text = model.generate("Summarise the Nifty IT index outlook").await?;
//! ```
//!
//! # Supported Models
//!
//! | Model | Description |
//! |-------|-------------|
//! | `gemini-2.0-flash` | Fast, efficient model (default) |
//! | `gemini-1.5-pro` | Most capable model |
//! | `gemini-1.5-flash` | Balanced speed/capability |

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use crate::error::{ReportError, Result};
use crate::model::GenerativeModel;

/// The default Gemini API base URL.
const GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";

/// The default model.
pub const DEFAULT_MODEL: &str = "gemini-2.0-flash";

/// A [`GenerativeModel`] backed by Google's Gemini API.
pub struct GeminiModel {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
}

impl GeminiModel {
    /// Create a model client with the given API key and model name.
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Result<Self> {
        let api_key = api_key.into();
        let model = model.into();
        if api_key.is_empty() {
            return Err(ReportError::Generation { model, message: "API key must not be empty".into() });
        }
        Ok(Self { client: reqwest::Client::new(), api_key, base_url: GEMINI_API_BASE.into(), model })
    }

    /// Create a client for [`DEFAULT_MODEL`] from `GEMINI_API_KEY`, falling
    /// back to `GOOGLE_API_KEY`.
    pub fn from_env() -> Result<Self> {
        let api_key = std::env::var("GEMINI_API_KEY")
            .or_else(|_| std::env::var("GOOGLE_API_KEY"))
            .map_err(|_| ReportError::Generation {
                model: DEFAULT_MODEL.into(),
                message: "GEMINI_API_KEY or GOOGLE_API_KEY environment variable not set".into(),
            })?;
        Self::new(api_key, DEFAULT_MODEL)
    }

    /// Set the model name.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Point at a different API root.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    fn err(&self, message: impl Into<String>) -> ReportError {
        ReportError::Generation { model: self.model.clone(), message: message.into() }
    }
}

// ── Gemini API request/response types ──────────────────────────────

#[derive(Serialize)]
struct GenerateRequest<'a> {
    contents: [Content<'a>; 1],
}

#[derive(Serialize)]
struct Content<'a> {
    role: &'static str,
    parts: [RequestPart<'a>; 1],
}

#[derive(Serialize)]
struct RequestPart<'a> {
    text: &'a str,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    content: Option<CandidateContent>,
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Deserialize)]
struct ResponsePart {
    text: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    block_reason: Option<String>,
}

#[derive(Deserialize)]
struct ErrorResponse {
    error: ErrorDetail,
}

#[derive(Deserialize)]
struct ErrorDetail {
    message: String,
}

// ── GenerativeModel implementation ─────────────────────────────────

#[async_trait]
impl GenerativeModel for GeminiModel {
    fn name(&self) -> &str {
        &self.model
    }

    async fn generate(&self, prompt: &str) -> Result<String> {
        debug!(model = %self.model, prompt_len = prompt.len(), "generating content");

        let body = GenerateRequest {
            contents: [Content { role: "user", parts: [RequestPart { text: prompt }] }],
        };
        let response = self
            .client
            .post(format!("{}/models/{}:generateContent", self.base_url, self.model))
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                error!(model = %self.model, error = %e, "request failed");
                self.err(format!("request failed: {e}"))
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            let detail = serde_json::from_str::<ErrorResponse>(&body)
                .map(|e| e.error.message)
                .unwrap_or(body);

            error!(model = %self.model, %status, "API error");
            return Err(self.err(format!("API returned {status}: {detail}")));
        }

        let parsed: GenerateResponse = response.json().await.map_err(|e| {
            error!(model = %self.model, error = %e, "failed to parse response");
            self.err(format!("failed to parse response: {e}"))
        })?;

        if let Some(reason) = parsed.prompt_feedback.and_then(|f| f.block_reason) {
            return Err(self.err(format!("prompt blocked: {reason}")));
        }
        let candidate = parsed
            .candidates
            .into_iter()
            .next()
            .ok_or_else(|| self.err("response contained no candidates"))?;
        let text: String = candidate
            .content
            .map(|c| c.parts.into_iter().filter_map(|p| p.text).collect())
            .unwrap_or_default();
        if text.is_empty() {
            let reason = candidate.finish_reason.unwrap_or_else(|| "unknown".into());
            return Err(self.err(format!("empty response (finish reason: {reason})")));
        }
        Ok(text)
    }
}
