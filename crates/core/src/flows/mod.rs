pub mod engine;
pub mod states;

pub use engine::{ChatFlow, FlowDefinition, FlowEngine, FlowTransitionError};
pub use states::{FlowAction, FlowContext, FlowEvent, FlowStage, FlowType, TransitionOutcome};
