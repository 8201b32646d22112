use std::sync::Arc;

use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use chrono::Utc;
use rahnuma_agent::llm::{GenerationOracle, OracleReadiness};
use serde::Serialize;

#[derive(Clone)]
pub struct HealthState {
    oracle: Arc<dyn GenerationOracle>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HealthCheck {
    pub status: &'static str,
    pub detail: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub service: HealthCheck,
    pub oracle: HealthCheck,
    pub checked_at: String,
}

pub fn router(oracle: Arc<dyn GenerationOracle>) -> Router {
    Router::new().route("/health", get(health)).with_state(HealthState { oracle })
}

pub async fn health(State(state): State<HealthState>) -> (StatusCode, Json<HealthResponse>) {
    let readiness = state.oracle.readiness();
    let ready = readiness.is_ready();

    let payload = HealthResponse {
        status: if ready { "ready" } else { "degraded" },
        service: HealthCheck {
            status: "ready",
            detail: "rahnuma-server runtime initialized".to_string(),
        },
        oracle: oracle_check(&readiness),
        checked_at: Utc::now().to_rfc3339(),
    };

    let status_code = if ready { StatusCode::OK } else { StatusCode::SERVICE_UNAVAILABLE };
    (status_code, Json(payload))
}

fn oracle_check(readiness: &OracleReadiness) -> HealthCheck {
    let detail = match readiness {
        OracleReadiness::Uninitialized => "model load has not started".to_string(),
        OracleReadiness::Loading => "model is loading".to_string(),
        OracleReadiness::Ready => "model loaded".to_string(),
        OracleReadiness::Failed(reason) => format!("model load failed: {reason}"),
    };
    HealthCheck { status: readiness.as_str(), detail }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::{extract::State, http::StatusCode, Json};
    use rahnuma_agent::fixtures::ScriptedOracle;
    use rahnuma_agent::llm::GenerationOracle;

    use crate::health::{health, HealthState};

    #[tokio::test]
    async fn health_returns_ready_once_oracle_loaded() {
        let oracle: Arc<dyn GenerationOracle> = Arc::new(ScriptedOracle::ready());

        let (status, Json(payload)) = health(State(HealthState { oracle })).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(payload.status, "ready");
        assert_eq!(payload.oracle.status, "ready");
        assert_eq!(payload.service.status, "ready");
    }

    #[tokio::test]
    async fn health_returns_service_unavailable_before_load() {
        let oracle: Arc<dyn GenerationOracle> = Arc::new(ScriptedOracle::default());

        let (status, Json(payload)) = health(State(HealthState { oracle })).await;

        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(payload.status, "degraded");
        assert_eq!(payload.oracle.status, "uninitialized");
    }

    #[tokio::test]
    async fn health_reports_failed_load_reason() {
        let scripted = Arc::new(ScriptedOracle::failing_load());
        assert!(scripted.load().await.is_err());
        let oracle: Arc<dyn GenerationOracle> = scripted;

        let (status, Json(payload)) = health(State(HealthState { oracle })).await;

        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(payload.oracle.status, "failed");
        assert!(payload.oracle.detail.contains("scripted load failure"));
    }
}
