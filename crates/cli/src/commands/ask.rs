use std::sync::Arc;

use anyhow::{anyhow, Context};
use rahnuma_agent::{ollama::OllamaOracle, runtime::AgentRuntime};
use rahnuma_core::config::{AppConfig, LoadOptions};
use rahnuma_core::{Intent, PipelineState};
use serde::Serialize;

use crate::commands::{render, CommandFailure, CommandResult, FailWith};

#[derive(Debug, Serialize)]
pub struct AskOutcome {
    pub intent: Intent,
    pub safety_passed: bool,
    pub reply: String,
}

impl From<PipelineState> for AskOutcome {
    fn from(state: PipelineState) -> Self {
        Self {
            intent: state.intent(),
            safety_passed: state.safety_passed(),
            reply: state.into_response(),
        }
    }
}

pub fn run(message: &str, history: Vec<String>) -> CommandResult {
    render("ask", execute(message, history))
}

/// Runs a single chat turn against the configured backend.
///
/// The backend loads the model on first use, so no explicit load is issued.
/// Screened input is refused locally without contacting the backend.
fn execute(message: &str, history: Vec<String>) -> Result<AskOutcome, CommandFailure> {
    if message.is_empty() {
        return Err(CommandFailure::new("invalid_input", 2, anyhow!("message must not be empty")));
    }

    let config = AppConfig::load(LoadOptions::default())
        .context("configuration issue")
        .fail_with("config_validation", 2)?;
    let oracle = OllamaOracle::new(&config.oracle).fail_with("oracle_client", 3)?;
    let agent = AgentRuntime::new(Arc::new(oracle), &config.pipeline);

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("failed to initialize async runtime")
        .fail_with("runtime_init", 3)?;

    let state = runtime
        .block_on(agent.invoke(PipelineState::new(message, history)))
        .fail_with("generation", 4)?;

    Ok(AskOutcome::from(state))
}
