//! Agent Runtime - the chat pipeline in front of the generation oracle
//!
//! This crate wires the Rahnuma assistant together:
//! - Screens raw user text against forbidden topics (`guardrails`)
//! - Classifies intent with a short, cold oracle call (`classifier`)
//! - Folds prior turns into the generation prompt (`conversation`)
//! - Talks to the model backend (`llm`, `ollama`)
//!
//! # Architecture
//!
//! `AgentRuntime` drives the core `ChatFlow` state machine one stage at a time:
//! 1. **Classify** - safety screen, then oracle classification
//! 2. **Safety gate** - blocked input receives the fixed refusal
//! 3. **Generate** - skipped when the gate already answered
//! 4. **Format** - trim the reply
//!
//! # Key Types
//!
//! - `AgentRuntime` - pipeline orchestrator (see `runtime` module)
//! - `GenerationOracle` - pluggable trait for the model backend
//! - `SafetyScreen` - keyword gate that never touches the model
//!
//! Blocked input never reaches the oracle, not even for classification.

pub mod classifier;
pub mod conversation;
pub mod fixtures;
pub mod guardrails;
pub mod llm;
pub mod ollama;
pub mod prompts;
pub mod runtime;
