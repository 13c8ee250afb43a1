//! Scripted model for tests and offline runs.

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::error::{ReportError, Result};
use crate::model::GenerativeModel;

enum Step {
    Respond(String),
    Fail(String),
}

/// A [`GenerativeModel`] that replays a script of responses and failures
/// and records every prompt it receives.
///
/// Once the script runs out, every call gets the fallback response
/// (`"mock response"` unless set with [`with_fallback`](Self::with_fallback)).
///
/// ```rust,ignore
/// use vitt_report::{GenerativeModel, MockModel};
///
/// let model = MockModel::new("mock").with_response("Summary text").with_failure("quota");
/// assert_eq!(model.generate("p1").await?, "Summary text");
/// assert!(model.generate("p2").await.is_err());
/// ```
pub struct MockModel {
    name: String,
    script: Mutex<VecDeque<Step>>,
    fallback: String,
    prompts: Mutex<Vec<String>>,
}

impl MockModel {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            script: Mutex::new(VecDeque::new()),
            fallback: "mock response".to_string(),
            prompts: Mutex::new(Vec::new()),
        }
    }

    /// Queue a successful response.
    pub fn with_response(self, text: impl Into<String>) -> Self {
        self.push(Step::Respond(text.into()));
        self
    }

    /// Queue a failure with the given message.
    pub fn with_failure(self, message: impl Into<String>) -> Self {
        self.push(Step::Fail(message.into()));
        self
    }

    /// Response returned once the script is exhausted.
    pub fn with_fallback(mut self, text: impl Into<String>) -> Self {
        self.fallback = text.into();
        self
    }

    /// Every prompt received so far, in call order.
    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().map(|p| p.clone()).unwrap_or_default()
    }

    fn push(&self, step: Step) {
        if let Ok(mut script) = self.script.lock() {
            script.push_back(step);
        }
    }
}

#[async_trait]
impl GenerativeModel for MockModel {
    fn name(&self) -> &str {
        &self.name
    }

    async fn generate(&self, prompt: &str) -> Result<String> {
        if let Ok(mut prompts) = self.prompts.lock() {
            prompts.push(prompt.to_string());
        }
        let step = self.script.lock().ok().and_then(|mut script| script.pop_front());
        match step {
            Some(Step::Respond(text)) => Ok(text),
            Some(Step::Fail(message)) => {
                Err(ReportError::Generation { model: self.name.clone(), message })
            }
            None => Ok(self.fallback.clone()),
        }
    }
}
