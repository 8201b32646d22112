use serde::{Deserialize, Serialize};

use crate::domain::intent::Intent;
use crate::errors::DomainError;

/// The record threaded through one chat pipeline run.
///
/// `user_input` and `history` are fixed at construction. `intent` moves from
/// `Unclassified` to a terminal label once. `response` is filled by the
/// first writer and only trimmed afterwards.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineState {
    user_input: String,
    history: Vec<String>,
    intent: Intent,
    safety_passed: bool,
    response: String,
}

impl PipelineState {
    pub fn new(user_input: impl Into<String>, history: Vec<String>) -> Self {
        Self {
            user_input: user_input.into(),
            history,
            intent: Intent::Unclassified,
            safety_passed: true,
            response: String::new(),
        }
    }

    pub fn user_input(&self) -> &str {
        &self.user_input
    }

    pub fn history(&self) -> &[String] {
        &self.history
    }

    pub fn intent(&self) -> Intent {
        self.intent
    }

    pub fn safety_passed(&self) -> bool {
        self.safety_passed
    }

    pub fn response(&self) -> &str {
        &self.response
    }

    pub fn has_response(&self) -> bool {
        !self.response.is_empty()
    }

    pub fn record_classification(
        &mut self,
        intent: Intent,
        safety_passed: bool,
    ) -> Result<(), DomainError> {
        if !intent.is_classified() {
            return Err(DomainError::InvariantViolation(
                "classification must resolve to a terminal intent".to_string(),
            ));
        }
        if self.intent.is_classified() {
            return Err(DomainError::InvariantViolation(format!(
                "intent already classified as `{}`",
                self.intent.as_str()
            )));
        }

        self.intent = intent;
        self.safety_passed = safety_passed;
        Ok(())
    }

    /// Stores `text` unless a response is already present. Returns whether
    /// the write happened.
    pub fn write_response(&mut self, text: impl Into<String>) -> bool {
        if self.has_response() {
            return false;
        }
        self.response = text.into();
        true
    }

    /// Safety-gate stage: a failed screen puts `refusal` in the response slot.
    pub fn apply_safety_gate(&mut self, refusal: &str) -> bool {
        if self.safety_passed {
            return false;
        }
        self.write_response(refusal)
    }

    /// Format stage: strips surrounding whitespace and nothing else.
    pub fn normalize_response(&mut self) {
        let trimmed = self.response.trim();
        if trimmed.len() != self.response.len() {
            self.response = trimmed.to_string();
        }
    }

    pub fn into_response(self) -> String {
        self.response
    }
}
