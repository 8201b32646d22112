//! Deterministic oracle for pipeline and handler tests.

use std::collections::VecDeque;
use std::sync::Mutex;

use anyhow::{anyhow, Result};
use async_trait::async_trait;

use crate::llm::{GenerationOracle, GenerationRequest, OracleReadiness, ReadinessCell};

enum ScriptedReply {
    Text(String),
    Failure(String),
}

/// Replays queued replies in order and records every request it receives.
/// With the queue empty it echoes a fixed fallback reply.
pub struct ScriptedOracle {
    replies: Mutex<VecDeque<ScriptedReply>>,
    requests: Mutex<Vec<GenerationRequest>>,
    readiness: ReadinessCell,
    fail_load: bool,
}

impl Default for ScriptedOracle {
    fn default() -> Self {
        Self {
            replies: Mutex::new(VecDeque::new()),
            requests: Mutex::new(Vec::new()),
            readiness: ReadinessCell::default(),
            fail_load: false,
        }
    }
}

impl ScriptedOracle {
    pub const FALLBACK_REPLY: &'static str = "chat";

    /// An oracle that already finished loading.
    pub fn ready() -> Self {
        let oracle = Self::default();
        oracle.readiness.begin_loading();
        oracle.readiness.mark_ready();
        oracle
    }

    /// An oracle whose `load` always fails.
    pub fn failing_load() -> Self {
        Self { fail_load: true, ..Self::default() }
    }

    pub fn with_replies<I, S>(self, replies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for reply in replies {
            self.push_reply(reply);
        }
        self
    }

    pub fn push_reply(&self, reply: impl Into<String>) {
        self.lock_replies().push_back(ScriptedReply::Text(reply.into()));
    }

    pub fn push_failure(&self, message: impl Into<String>) {
        self.lock_replies().push_back(ScriptedReply::Failure(message.into()));
    }

    pub fn calls(&self) -> usize {
        self.lock_requests().len()
    }

    pub fn requests(&self) -> Vec<GenerationRequest> {
        self.lock_requests().clone()
    }

    fn lock_replies(&self) -> std::sync::MutexGuard<'_, VecDeque<ScriptedReply>> {
        self.replies.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn lock_requests(&self) -> std::sync::MutexGuard<'_, Vec<GenerationRequest>> {
        self.requests.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl GenerationOracle for ScriptedOracle {
    fn readiness(&self) -> OracleReadiness {
        self.readiness.get()
    }

    async fn load(&self) -> Result<()> {
        if !self.readiness.begin_loading() {
            return Ok(());
        }
        if self.fail_load {
            self.readiness.mark_failed("scripted load failure");
            return Err(anyhow!("scripted load failure"));
        }
        self.readiness.mark_ready();
        Ok(())
    }

    async fn generate(&self, request: &GenerationRequest) -> Result<String> {
        self.lock_requests().push(request.clone());
        match self.lock_replies().pop_front() {
            Some(ScriptedReply::Text(text)) => Ok(text),
            Some(ScriptedReply::Failure(message)) => Err(anyhow!(message)),
            None => Ok(Self::FALLBACK_REPLY.to_string()),
        }
    }
}
