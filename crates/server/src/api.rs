//! JSON API routes for the assistant.
//!
//! - `POST /generate`: raw oracle access with caller-chosen sampling
//! - `POST /chat`: the full chat pipeline (screen, classify, generate, format)
//!
//! Failures are rendered through `Endpoint::disposition`.

use std::path::Path;
use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};
use rahnuma_agent::llm::{GenerationOracle, GenerationRequest, SamplingParams};
use rahnuma_agent::prompts::DEFAULT_GENERATE_SYSTEM_PROMPT;
use rahnuma_agent::runtime::AgentRuntime;
use rahnuma_core::errors::{EMPTY_MESSAGE_DETAIL, INTERNAL_ERROR_DETAIL};
use rahnuma_core::{Endpoint, ErrorDisposition, ServiceError};
use serde::{Deserialize, Serialize};
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::health;

const DEFAULT_MAX_NEW_TOKENS: u32 = 128;
const DEFAULT_TEMPERATURE: f32 = 0.6;
const DEFAULT_TOP_P: f32 = 0.9;

#[derive(Clone)]
pub struct ApiState {
    runtime: Arc<AgentRuntime>,
}

impl ApiState {
    pub fn new(runtime: Arc<AgentRuntime>) -> Self {
        Self { runtime }
    }

    fn oracle(&self) -> &Arc<dyn GenerationOracle> {
        self.runtime.oracle()
    }
}

// ---------------------------------------------------------------------------
// Request / Response types
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct GenerateRequest {
    pub prompt: String,
    pub system_prompt: Option<String>,
    pub max_new_tokens: Option<u32>,
    pub temperature: Option<f32>,
    pub top_p: Option<f32>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct GenerateResponse {
    pub response: String,
}

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    #[serde(default)]
    pub user_message: String,
    pub history: Option<Vec<String>>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ChatResponse {
    pub assistant_reply: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub detail: String,
}

/// A failure on a given endpoint, rendered according to its policy.
#[derive(Debug)]
pub struct ApiError {
    endpoint: Endpoint,
    error: ServiceError,
    correlation_id: String,
}

impl ApiError {
    fn new(endpoint: Endpoint, error: ServiceError, correlation_id: &str) -> Self {
        Self { endpoint, error, correlation_id: correlation_id.to_string() }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let disposition = self.endpoint.disposition(&self.error);
        match &self.error {
            ServiceError::GenerationFailure { .. } => error!(
                event_name = "api.request.failed",
                correlation_id = %self.correlation_id,
                endpoint = self.endpoint.as_str(),
                masked = disposition.is_masked(),
                error = %self.error,
                "request failed during generation"
            ),
            _ => warn!(
                event_name = "api.request.rejected",
                correlation_id = %self.correlation_id,
                endpoint = self.endpoint.as_str(),
                error = %self.error,
                "request rejected"
            ),
        }

        match disposition {
            ErrorDisposition::Expose { status, detail } => {
                (status_code(status), Json(ErrorBody { detail })).into_response()
            }
            ErrorDisposition::Mask { status, fallback } => {
                (status_code(status), Json(ChatResponse { assistant_reply: fallback }))
                    .into_response()
            }
        }
    }
}

fn status_code(status: u16) -> StatusCode {
    StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
}

fn ensure_ready(oracle: &dyn GenerationOracle) -> Result<(), ServiceError> {
    let readiness = oracle.readiness();
    if readiness.is_ready() {
        Ok(())
    } else {
        Err(ServiceError::NotReady { state: readiness.as_str().to_string() })
    }
}

// ---------------------------------------------------------------------------
// Router
// ---------------------------------------------------------------------------

pub fn router(runtime: Arc<AgentRuntime>, ui_dir: Option<&Path>) -> Router {
    let oracle = Arc::clone(runtime.oracle());
    let mut app = Router::new()
        .route("/generate", post(generate))
        .route("/chat", post(chat))
        .with_state(ApiState::new(runtime))
        .merge(health::router(oracle));

    if let Some(dir) = ui_dir.filter(|dir| dir.is_dir()) {
        app = app.fallback_service(ServeDir::new(dir).append_index_html_on_directories(true));
    }

    app.layer(CorsLayer::permissive())
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

async fn generate(
    State(state): State<ApiState>,
    body: Result<Json<GenerateRequest>, JsonRejection>,
) -> Result<Json<GenerateResponse>, ApiError> {
    let correlation_id = Uuid::new_v4().simple().to_string();
    let fail = |error: ServiceError| ApiError::new(Endpoint::Generate, error, &correlation_id);

    ensure_ready(state.oracle().as_ref()).map_err(fail)?;
    let Json(body) =
        body.map_err(|rejection| fail(ServiceError::InvalidInput { message: rejection.body_text() }))?;

    let request = GenerationRequest::new(
        body.prompt,
        body.system_prompt.unwrap_or_else(|| DEFAULT_GENERATE_SYSTEM_PROMPT.to_string()),
        SamplingParams {
            max_new_tokens: body.max_new_tokens.unwrap_or(DEFAULT_MAX_NEW_TOKENS),
            temperature: body.temperature.unwrap_or(DEFAULT_TEMPERATURE),
            top_p: body.top_p.unwrap_or(DEFAULT_TOP_P),
            repetition_penalty: None,
        },
    );

    info!(
        event_name = "generate.request.received",
        correlation_id = %correlation_id,
        max_new_tokens = request.sampling.max_new_tokens,
        "raw generation requested"
    );

    let response = state
        .oracle()
        .generate(&request)
        .await
        .map_err(|error| fail(ServiceError::generation(error.to_string())))?;

    Ok(Json(GenerateResponse { response: response.trim().to_string() }))
}

async fn chat(
    State(state): State<ApiState>,
    body: Result<Json<ChatRequest>, JsonRejection>,
) -> Result<Json<ChatResponse>, ApiError> {
    let correlation_id = Uuid::new_v4().simple().to_string();
    let fail = |error: ServiceError| ApiError::new(Endpoint::Chat, error, &correlation_id);

    let Json(body) = body.map_err(|rejection| {
        fail(ServiceError::InvalidInput { message: rejection.body_text() })
    })?;
    if body.user_message.is_empty() {
        return Err(fail(ServiceError::InvalidInput {
            message: EMPTY_MESSAGE_DETAIL.to_string(),
        }));
    }
    ensure_ready(state.oracle().as_ref()).map_err(fail)?;

    let history = body.history.unwrap_or_default();
    info!(
        event_name = "chat.request.received",
        correlation_id = %correlation_id,
        history_turns = history.len(),
        "chat message received"
    );

    // Detached from the request future so a dropped connection does not
    // cancel an inference already on the device.
    let runtime = Arc::clone(&state.runtime);
    let message = body.user_message;
    let run = tokio::spawn(async move { runtime.handle_message(&message, history).await });

    let reply = match run.await {
        Ok(Ok(reply)) => reply,
        Ok(Err(error)) => return Err(fail(ServiceError::generation(error.to_string()))),
        Err(join_error) => {
            return Err(fail(ServiceError::generation(format!(
                "{INTERNAL_ERROR_DETAIL}: {join_error}"
            ))))
        }
    };

    info!(
        event_name = "chat.request.completed",
        correlation_id = %correlation_id,
        reply_chars = reply.chars().count(),
        "chat reply produced"
    );

    Ok(Json(ChatResponse { assistant_reply: reply }))
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::sync::Arc;
    use std::time::Duration;

    use async_trait::async_trait;

    use axum::{
        body::{to_bytes, Body},
        http::{header, Method, Request, StatusCode},
        Router,
    };
    use rahnuma_agent::fixtures::ScriptedOracle;
    use rahnuma_agent::llm::{GenerationOracle, GenerationRequest, OracleReadiness};
    use rahnuma_agent::prompts::{DEFAULT_GENERATE_SYSTEM_PROMPT, SAFETY_REFUSAL};
    use rahnuma_agent::runtime::AgentRuntime;
    use rahnuma_core::config::PipelineConfig;
    use rahnuma_core::errors::{CHAT_FALLBACK_REPLY, EMPTY_MESSAGE_DETAIL, NOT_READY_DETAIL};
    use serde_json::{json, Value};
    use tokio::sync::{Notify, Semaphore};
    use tower::ServiceExt;

    use super::router;

    /// Holds every generation until the test releases a permit.
    struct GatedOracle {
        inner: ScriptedOracle,
        gate: Semaphore,
        started: Notify,
    }

    impl GatedOracle {
        fn new() -> Self {
            Self { inner: ScriptedOracle::ready(), gate: Semaphore::new(0), started: Notify::new() }
        }
    }

    #[async_trait]
    impl GenerationOracle for GatedOracle {
        fn readiness(&self) -> OracleReadiness {
            OracleReadiness::Ready
        }

        async fn load(&self) -> anyhow::Result<()> {
            Ok(())
        }

        async fn generate(&self, request: &GenerationRequest) -> anyhow::Result<String> {
            self.started.notify_one();
            self.gate.acquire().await?.forget();
            self.inner.generate(request).await
        }
    }

    fn app(oracle: &Arc<ScriptedOracle>) -> Router {
        let runtime = Arc::new(AgentRuntime::new(oracle.clone(), &PipelineConfig::default()));
        router(runtime, None)
    }

    async fn post_json(app: Router, uri: &str, body: Value) -> (StatusCode, Value) {
        let request = Request::builder()
            .method(Method::POST)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .expect("request builds");
        let response = app.oneshot(request).await.expect("router responds");
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.expect("body reads");
        let payload = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, payload)
    }

    #[tokio::test]
    async fn chat_greeting_returns_trimmed_model_reply() {
        let oracle =
            Arc::new(ScriptedOracle::ready().with_replies(["chat", "  میں ٹھیک ہوں  "]));

        let (status, payload) =
            post_json(app(&oracle), "/chat", json!({ "user_message": "آپ کیسے ہیں؟" })).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(payload["assistant_reply"], "میں ٹھیک ہوں");
        assert_eq!(oracle.calls(), 2);
    }

    #[tokio::test]
    async fn chat_blocked_input_returns_refusal_without_oracle() {
        let oracle = Arc::new(ScriptedOracle::ready());

        let (status, payload) = post_json(
            app(&oracle),
            "/chat",
            json!({ "user_message": "مجھے دوائی بتائیں", "history": ["صارف: سلام"] }),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(payload["assistant_reply"], SAFETY_REFUSAL);
        assert_eq!(oracle.calls(), 0);
    }

    #[tokio::test]
    async fn chat_empty_message_is_bad_request() {
        let oracle = Arc::new(ScriptedOracle::ready());

        let (status, payload) =
            post_json(app(&oracle), "/chat", json!({ "user_message": "" })).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(payload["detail"], EMPTY_MESSAGE_DETAIL);

        let (status, _) = post_json(app(&oracle), "/chat", json!({ "history": [] })).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(oracle.calls(), 0);
    }

    #[tokio::test]
    async fn chat_whitespace_message_runs_the_pipeline() {
        let oracle = Arc::new(ScriptedOracle::ready());

        let (status, payload) =
            post_json(app(&oracle), "/chat", json!({ "user_message": "   " })).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(payload["assistant_reply"], ScriptedOracle::FALLBACK_REPLY);
        assert_eq!(oracle.calls(), 2);
    }

    #[tokio::test]
    async fn chat_dropped_by_caller_still_finishes_generation() {
        let oracle = Arc::new(GatedOracle::new());
        let runtime = Arc::new(AgentRuntime::new(oracle.clone(), &PipelineConfig::default()));
        let request = Request::builder()
            .method(Method::POST)
            .uri("/chat")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(json!({ "user_message": "سلام" }).to_string()))
            .expect("request builds");

        let caller = tokio::spawn(router(runtime, None).oneshot(request));
        oracle.started.notified().await;
        caller.abort();
        assert!(caller.await.is_err(), "caller future should be cancelled");

        oracle.gate.add_permits(2);
        let finished = tokio::time::timeout(Duration::from_secs(2), async {
            while oracle.inner.calls() < 2 {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await;

        assert!(finished.is_ok(), "pipeline should run to completion after the caller left");
        assert_eq!(oracle.inner.requests()[1].prompt, "سلام");
    }

    #[tokio::test]
    async fn chat_generation_failure_is_masked() {
        let oracle = Arc::new(ScriptedOracle::ready());
        oracle.push_failure("CUDA out of memory");

        let (status, payload) =
            post_json(app(&oracle), "/chat", json!({ "user_message": "سلام" })).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(payload["assistant_reply"], CHAT_FALLBACK_REPLY);
        assert!(!payload.to_string().contains("CUDA"));
    }

    #[tokio::test]
    async fn chat_before_load_is_service_unavailable() {
        let oracle = Arc::new(ScriptedOracle::default());

        let (status, payload) =
            post_json(app(&oracle), "/chat", json!({ "user_message": "سلام" })).await;

        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(payload["detail"], NOT_READY_DETAIL);
        assert_eq!(oracle.calls(), 0);
    }

    #[tokio::test]
    async fn generate_before_load_is_service_unavailable() {
        let oracle = Arc::new(ScriptedOracle::default());

        let (status, payload) =
            post_json(app(&oracle), "/generate", json!({ "prompt": "سلام" })).await;

        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(payload["detail"], NOT_READY_DETAIL);
    }

    #[tokio::test]
    async fn generate_applies_defaults_and_trims() {
        let oracle = Arc::new(ScriptedOracle::ready().with_replies(["\n جواب \n"]));

        let (status, payload) =
            post_json(app(&oracle), "/generate", json!({ "prompt": "سلام" })).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(payload["response"], "جواب");

        let requests = oracle.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].prompt, "سلام");
        assert_eq!(requests[0].system_prompt, DEFAULT_GENERATE_SYSTEM_PROMPT);
        assert_eq!(requests[0].sampling.max_new_tokens, 128);
        assert_eq!(requests[0].sampling.temperature, 0.6);
        assert_eq!(requests[0].sampling.top_p, 0.9);
    }

    #[tokio::test]
    async fn generate_honours_caller_sampling() {
        let oracle = Arc::new(ScriptedOracle::ready().with_replies(["ok"]));

        let (status, _) = post_json(
            app(&oracle),
            "/generate",
            json!({
                "prompt": "لکھیں",
                "system_prompt": "custom",
                "max_new_tokens": 32,
                "temperature": 0.2,
                "top_p": 0.5
            }),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        let request = &oracle.requests()[0];
        assert_eq!(request.system_prompt, "custom");
        assert_eq!(request.sampling.max_new_tokens, 32);
        assert_eq!(request.sampling.temperature, 0.2);
        assert_eq!(request.sampling.top_p, 0.5);
    }

    #[tokio::test]
    async fn generate_failure_is_an_opaque_server_error() {
        let oracle = Arc::new(ScriptedOracle::ready());
        oracle.push_failure("tensor shape mismatch");

        let (status, payload) =
            post_json(app(&oracle), "/generate", json!({ "prompt": "سلام" })).await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(!payload.to_string().contains("tensor"));
    }

    #[tokio::test]
    async fn health_route_is_mounted() {
        let oracle = Arc::new(ScriptedOracle::ready());
        let request =
            Request::builder().uri("/health").body(Body::empty()).expect("request builds");

        let response = app(&oracle).oneshot(request).await.expect("router responds");

        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn ui_bundle_is_served_at_root() {
        let dir = tempfile::tempdir().expect("temp dir");
        fs::write(dir.path().join("index.html"), "<html>rahnuma</html>").expect("write index");

        let oracle = Arc::new(ScriptedOracle::ready());
        let runtime = Arc::new(AgentRuntime::new(oracle, &PipelineConfig::default()));
        let request = Request::builder().uri("/").body(Body::empty()).expect("request builds");

        let response =
            router(runtime, Some(dir.path())).oneshot(request).await.expect("router responds");

        assert_eq!(response.status(), StatusCode::OK);
        let bytes = to_bytes(response.into_body(), usize::MAX).await.expect("body reads");
        assert!(String::from_utf8_lossy(&bytes).contains("rahnuma"));
    }
}
