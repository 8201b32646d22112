use serde::{Deserialize, Serialize};

use crate::domain::state::PipelineState;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum FlowType {
    Chat,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum FlowStage {
    Classifying,
    Gated,
    Generating,
    Formatting,
    Done,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum FlowEvent {
    Classified,
    GateEvaluated,
    ResponseGenerated,
    Formatted,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct FlowContext {
    pub intent_classified: bool,
    pub refusal_required: bool,
    pub response_present: bool,
}

impl FlowContext {
    pub fn from_state(state: &PipelineState) -> Self {
        Self {
            intent_classified: state.intent().is_classified(),
            refusal_required: state.intent().is_classified() && !state.safety_passed(),
            response_present: state.has_response(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum FlowAction {
    RunSafetyGate,
    ServeRefusal,
    InvokeOracle,
    SkipGeneration,
    TrimResponse,
    ReturnResponse,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionOutcome {
    pub from: FlowStage,
    pub to: FlowStage,
    pub event: FlowEvent,
    pub actions: Vec<FlowAction>,
}
