pub mod config;
pub mod domain;
pub mod errors;
pub mod flows;

pub use domain::intent::Intent;
pub use domain::state::PipelineState;
pub use errors::{DomainError, Endpoint, ErrorDisposition, ErrorKind, ServiceError};
pub use flows::{ChatFlow, FlowAction, FlowContext, FlowEngine, FlowEvent, FlowStage};
