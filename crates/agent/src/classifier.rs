use std::sync::Arc;

use anyhow::Result;
use rahnuma_core::Intent;
use tracing::debug;

use crate::guardrails::SafetyScreen;
use crate::llm::{GenerationOracle, GenerationRequest, SamplingParams};
use crate::prompts::{classification_prompt, CLASSIFIER_SYSTEM_PROMPT};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Classification {
    pub intent: Intent,
    pub safety_passed: bool,
}

impl Classification {
    fn from_intent(intent: Intent) -> Self {
        Self { intent, safety_passed: intent != Intent::Blocked }
    }
}

pub struct IntentClassifier {
    oracle: Arc<dyn GenerationOracle>,
    screen: SafetyScreen,
    sampling: SamplingParams,
}

impl IntentClassifier {
    pub fn new(
        oracle: Arc<dyn GenerationOracle>,
        screen: SafetyScreen,
        sampling: SamplingParams,
    ) -> Self {
        Self { oracle, screen, sampling }
    }

    /// Screens `input`, then asks the oracle for a label.
    ///
    /// Input that fails the screen is `Blocked` without an oracle call. The
    /// model may also answer `blocked`, which fails safety the same way.
    /// Oracle errors are returned as-is.
    pub async fn classify(&self, input: &str) -> Result<Classification> {
        if let Some(violation) = self.screen.first_violation(input) {
            debug!(
                event_name = "chat.classify.screened",
                reason_code = violation.category.reason_code(),
                "input failed the safety screen"
            );
            return Ok(Classification::from_intent(Intent::Blocked));
        }

        let request = GenerationRequest::new(
            classification_prompt(input),
            CLASSIFIER_SYSTEM_PROMPT,
            self.sampling.clone(),
        );
        let raw = self.oracle.generate(&request).await?;
        let intent = Intent::from_classifier_output(&raw);

        debug!(event_name = "chat.classify.labelled", intent = intent.as_str(), "intent classified");
        Ok(Classification::from_intent(intent))
    }
}
