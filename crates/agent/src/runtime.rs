use std::sync::Arc;

use anyhow::Result;
use rahnuma_core::config::PipelineConfig;
use rahnuma_core::flows::{
    ChatFlow, FlowAction, FlowContext, FlowEngine, FlowEvent, FlowStage, TransitionOutcome,
};
use rahnuma_core::{DomainError, PipelineState};
use tracing::{debug, info};

use crate::classifier::IntentClassifier;
use crate::conversation::assemble;
use crate::guardrails::SafetyScreen;
use crate::llm::{GenerationOracle, GenerationRequest, SamplingParams};
use crate::prompts::{SAFETY_REFUSAL, SYSTEM_PROMPT};

/// Runs one chat turn through classify, safety-gate, generate and format.
///
/// Stages execute strictly in sequence on a state owned by the run. The flow
/// table decides whether generation runs; a refusal written by the gate
/// skips the oracle entirely.
pub struct AgentRuntime {
    oracle: Arc<dyn GenerationOracle>,
    classifier: IntentClassifier,
    flow: FlowEngine<ChatFlow>,
    generation: SamplingParams,
}

impl AgentRuntime {
    pub fn new(oracle: Arc<dyn GenerationOracle>, pipeline: &PipelineConfig) -> Self {
        Self::with_screen(oracle, pipeline, SafetyScreen::default())
    }

    pub fn with_screen(
        oracle: Arc<dyn GenerationOracle>,
        pipeline: &PipelineConfig,
        screen: SafetyScreen,
    ) -> Self {
        let classifier = IntentClassifier::new(
            Arc::clone(&oracle),
            screen,
            SamplingParams::from(&pipeline.classifier),
        );
        Self {
            oracle,
            classifier,
            flow: FlowEngine::default(),
            generation: SamplingParams::from(&pipeline.generation),
        }
    }

    pub fn oracle(&self) -> &Arc<dyn GenerationOracle> {
        &self.oracle
    }

    pub async fn handle_message(&self, text: &str, history: Vec<String>) -> Result<String> {
        let state = self.invoke(PipelineState::new(text, history)).await?;
        Ok(state.into_response())
    }

    pub async fn invoke(&self, mut state: PipelineState) -> Result<PipelineState> {
        let mut stage = self.flow.initial_stage();
        let mut pending = Vec::new();

        while stage != FlowStage::Done {
            let event = self.run_stage(&stage, &pending, &mut state).await?;
            let outcome = self.advance(&stage, &event, &state)?;
            pending = outcome.actions;
            stage = outcome.to;
        }

        Ok(state)
    }

    async fn run_stage(
        &self,
        stage: &FlowStage,
        pending: &[FlowAction],
        state: &mut PipelineState,
    ) -> Result<FlowEvent> {
        let event = match stage {
            FlowStage::Classifying => {
                let classification = self.classifier.classify(state.user_input()).await?;
                state.record_classification(classification.intent, classification.safety_passed)?;
                FlowEvent::Classified
            }
            FlowStage::Gated => {
                if pending.contains(&FlowAction::ServeRefusal)
                    && state.apply_safety_gate(SAFETY_REFUSAL)
                {
                    info!(
                        event_name = "chat.pipeline.blocked",
                        intent = state.intent().as_str(),
                        "refusal served without generation"
                    );
                }
                FlowEvent::GateEvaluated
            }
            FlowStage::Generating => {
                if pending.contains(&FlowAction::InvokeOracle) {
                    let prompt = assemble(state.user_input(), state.history());
                    let request =
                        GenerationRequest::new(prompt, SYSTEM_PROMPT, self.generation.clone());
                    let reply = self.oracle.generate(&request).await?;
                    if !state.write_response(reply) {
                        return Err(DomainError::InvariantViolation(
                            "generation found a response already present".to_string(),
                        )
                        .into());
                    }
                }
                FlowEvent::ResponseGenerated
            }
            FlowStage::Formatting => {
                state.normalize_response();
                FlowEvent::Formatted
            }
            FlowStage::Done => {
                return Err(DomainError::InvariantViolation(
                    "pipeline already finished".to_string(),
                )
                .into());
            }
        };

        Ok(event)
    }

    fn advance(
        &self,
        stage: &FlowStage,
        event: &FlowEvent,
        state: &PipelineState,
    ) -> Result<TransitionOutcome, DomainError> {
        let outcome = self.flow.apply(stage, event, &FlowContext::from_state(state))?;
        debug!(
            event_name = "chat.pipeline.transition",
            from = ?outcome.from,
            to = ?outcome.to,
            actions = ?outcome.actions,
            intent = state.intent().as_str(),
            "pipeline stage completed"
        );
        Ok(outcome)
    }
}
