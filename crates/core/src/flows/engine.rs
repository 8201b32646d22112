use thiserror::Error;

use crate::flows::states::{
    FlowAction, FlowContext, FlowEvent, FlowStage, FlowType, TransitionOutcome,
};

pub trait FlowDefinition {
    fn flow_type(&self) -> FlowType;
    fn initial_stage(&self) -> FlowStage;
    fn transition(
        &self,
        current: &FlowStage,
        event: &FlowEvent,
        context: &FlowContext,
    ) -> Result<TransitionOutcome, FlowTransitionError>;
}

/// classify -> safety-gate -> generate -> format, with generation skipped
/// when the gate already produced a response.
#[derive(Clone, Debug, Default)]
pub struct ChatFlow;

impl FlowDefinition for ChatFlow {
    fn flow_type(&self) -> FlowType {
        FlowType::Chat
    }

    fn initial_stage(&self) -> FlowStage {
        FlowStage::Classifying
    }

    fn transition(
        &self,
        current: &FlowStage,
        event: &FlowEvent,
        context: &FlowContext,
    ) -> Result<TransitionOutcome, FlowTransitionError> {
        transition_chat(current, event, context)
    }
}

pub struct FlowEngine<F> {
    flow: F,
}

impl<F> FlowEngine<F>
where
    F: FlowDefinition,
{
    pub fn new(flow: F) -> Self {
        Self { flow }
    }

    pub fn flow_type(&self) -> FlowType {
        self.flow.flow_type()
    }

    pub fn initial_stage(&self) -> FlowStage {
        self.flow.initial_stage()
    }

    pub fn apply(
        &self,
        current: &FlowStage,
        event: &FlowEvent,
        context: &FlowContext,
    ) -> Result<TransitionOutcome, FlowTransitionError> {
        self.flow.transition(current, event, context)
    }
}

impl Default for FlowEngine<ChatFlow> {
    fn default() -> Self {
        Self::new(ChatFlow)
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum FlowTransitionError {
    #[error("cannot leave {stage:?} before the intent is classified")]
    MissingClassification { stage: FlowStage },
    #[error("invalid transition from {stage:?} using event {event:?}")]
    InvalidTransition { stage: FlowStage, event: FlowEvent },
}

fn transition_chat(
    current: &FlowStage,
    event: &FlowEvent,
    context: &FlowContext,
) -> Result<TransitionOutcome, FlowTransitionError> {
    use FlowAction::{
        InvokeOracle, ReturnResponse, RunSafetyGate, ServeRefusal, SkipGeneration, TrimResponse,
    };
    use FlowEvent::{Classified, Formatted, GateEvaluated, ResponseGenerated};
    use FlowStage::{Classifying, Done, Formatting, Gated, Generating};

    let (to, actions) = match (current, event) {
        (Classifying, Classified) => {
            if !context.intent_classified {
                return Err(FlowTransitionError::MissingClassification { stage: current.clone() });
            }
            if context.refusal_required {
                (Gated, vec![RunSafetyGate, ServeRefusal])
            } else {
                (Gated, vec![RunSafetyGate])
            }
        }
        (Gated, GateEvaluated) => {
            if context.response_present {
                (Generating, vec![SkipGeneration])
            } else {
                (Generating, vec![InvokeOracle])
            }
        }
        (Generating, ResponseGenerated) => (Formatting, vec![TrimResponse]),
        (Formatting, Formatted) => (Done, vec![ReturnResponse]),
        _ => {
            return Err(FlowTransitionError::InvalidTransition {
                stage: current.clone(),
                event: event.clone(),
            });
        }
    };

    Ok(TransitionOutcome { from: current.clone(), to, event: event.clone(), actions })
}
