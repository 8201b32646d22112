use std::sync::RwLock;

use anyhow::Result;
use async_trait::async_trait;
use rahnuma_core::config::SamplingConfig;

#[derive(Clone, Debug, PartialEq)]
pub struct SamplingParams {
    pub max_new_tokens: u32,
    pub temperature: f32,
    pub top_p: f32,
    pub repetition_penalty: Option<f32>,
}

impl From<&SamplingConfig> for SamplingParams {
    fn from(config: &SamplingConfig) -> Self {
        Self {
            max_new_tokens: config.max_new_tokens,
            temperature: config.temperature,
            top_p: config.top_p,
            repetition_penalty: config.repetition_penalty,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct GenerationRequest {
    pub prompt: String,
    pub system_prompt: String,
    pub sampling: SamplingParams,
}

impl GenerationRequest {
    pub fn new(
        prompt: impl Into<String>,
        system_prompt: impl Into<String>,
        sampling: SamplingParams,
    ) -> Self {
        Self { prompt: prompt.into(), system_prompt: system_prompt.into(), sampling }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum OracleReadiness {
    Uninitialized,
    Loading,
    Ready,
    Failed(String),
}

impl OracleReadiness {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Uninitialized => "uninitialized",
            Self::Loading => "loading",
            Self::Ready => "ready",
            Self::Failed(_) => "failed",
        }
    }

    pub fn is_ready(&self) -> bool {
        matches!(self, Self::Ready)
    }
}

/// The model backend. `load` is called once at process start; `generate`
/// returns only the newly generated continuation.
#[async_trait]
pub trait GenerationOracle: Send + Sync {
    fn readiness(&self) -> OracleReadiness;
    async fn load(&self) -> Result<()>;
    async fn generate(&self, request: &GenerationRequest) -> Result<String>;
}

/// Shared `Uninitialized -> Loading -> Ready | Failed` bookkeeping.
#[derive(Debug)]
pub struct ReadinessCell {
    state: RwLock<OracleReadiness>,
}

impl Default for ReadinessCell {
    fn default() -> Self {
        Self { state: RwLock::new(OracleReadiness::Uninitialized) }
    }
}

impl ReadinessCell {
    pub fn get(&self) -> OracleReadiness {
        match self.state.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// Moves to `Loading` unless a load is in flight or already finished.
    pub fn begin_loading(&self) -> bool {
        let mut guard = match self.state.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        match *guard {
            OracleReadiness::Uninitialized | OracleReadiness::Failed(_) => {
                *guard = OracleReadiness::Loading;
                true
            }
            OracleReadiness::Loading | OracleReadiness::Ready => false,
        }
    }

    pub fn mark_ready(&self) {
        self.set(OracleReadiness::Ready);
    }

    pub fn mark_failed(&self, reason: impl Into<String>) {
        self.set(OracleReadiness::Failed(reason.into()));
    }

    fn set(&self, next: OracleReadiness) {
        match self.state.write() {
            Ok(mut guard) => *guard = next,
            Err(poisoned) => *poisoned.into_inner() = next,
        }
    }
}
