use std::time::Duration;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use rahnuma_core::config::OracleConfig;
use reqwest::{Client, RequestBuilder};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::llm::{GenerationOracle, GenerationRequest, OracleReadiness, ReadinessCell};

const END_OF_TURN: &str = "<|eot_id|>";
const END_OF_TEXT: &str = "<|end_of_text|>";

/// Oracle backed by an Ollama-compatible model runtime.
///
/// Prompts are sent raw in the Llama-3 chat layout, so the backend applies no
/// template of its own. Generation calls are serialized: the runtime sits on
/// one device and handles one inference at a time.
pub struct OllamaOracle {
    base_url: String,
    model: String,
    api_key: Option<SecretString>,
    keep_alive: String,
    client: Client,
    readiness: ReadinessCell,
    generation_lock: Mutex<()>,
}

#[derive(Debug, Serialize)]
struct GenerateBody<'a> {
    model: &'a str,
    prompt: String,
    raw: bool,
    stream: bool,
    keep_alive: &'a str,
    options: GenerateOptions,
}

#[derive(Debug, Serialize)]
struct GenerateOptions {
    num_predict: u32,
    temperature: f32,
    top_p: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    repeat_penalty: Option<f32>,
    stop: [&'static str; 2],
}

#[derive(Debug, Serialize)]
struct LoadBody<'a> {
    model: &'a str,
    keep_alive: &'a str,
}

#[derive(Debug, Deserialize)]
struct GenerateReply {
    #[serde(default)]
    response: String,
}

#[derive(Debug, Deserialize)]
struct TagsReply {
    #[serde(default)]
    models: Vec<TagEntry>,
}

#[derive(Debug, Deserialize)]
struct TagEntry {
    name: String,
}

impl OllamaOracle {
    pub fn new(config: &OracleConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .connect_timeout(Duration::from_secs(10))
            .build()
            .context("failed to build oracle http client")?;

        Ok(Self {
            base_url: config.base_url.trim().trim_end_matches('/').to_string(),
            model: config.model.clone(),
            api_key: config.api_key.clone(),
            keep_alive: config.keep_alive.clone(),
            client,
            readiness: ReadinessCell::default(),
            generation_lock: Mutex::new(()),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Model tags the backend currently serves.
    pub async fn list_models(&self) -> Result<Vec<String>> {
        let url = format!("{}/api/tags", self.base_url);
        let response = self.authorize(self.client.get(&url)).send().await?;
        if !response.status().is_success() {
            bail!("oracle backend returned {} for {url}", response.status());
        }
        let tags: TagsReply = response.json().await?;
        Ok(tags.models.into_iter().map(|entry| entry.name).collect())
    }

    fn authorize(&self, builder: RequestBuilder) -> RequestBuilder {
        match &self.api_key {
            Some(key) => builder.bearer_auth(key.expose_secret()),
            None => builder,
        }
    }

    async fn post_generate<B: Serialize + ?Sized>(&self, body: &B) -> Result<GenerateReply> {
        let url = format!("{}/api/generate", self.base_url);
        let response = self.authorize(self.client.post(&url).json(body)).send().await?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            bail!("oracle backend returned {status}: {detail}");
        }

        Ok(response.json().await?)
    }
}

#[async_trait]
impl GenerationOracle for OllamaOracle {
    fn readiness(&self) -> OracleReadiness {
        self.readiness.get()
    }

    async fn load(&self) -> Result<()> {
        if !self.readiness.begin_loading() {
            return Ok(());
        }

        info!(
            event_name = "oracle.load.start",
            correlation_id = "bootstrap",
            model = %self.model,
            base_url = %self.base_url,
            "loading generation model"
        );

        // An empty generate request makes the runtime load the weights.
        let body = LoadBody { model: &self.model, keep_alive: &self.keep_alive };
        match self.post_generate(&body).await {
            Ok(_) => {
                self.readiness.mark_ready();
                info!(
                    event_name = "oracle.load.ready",
                    correlation_id = "bootstrap",
                    model = %self.model,
                    "generation model loaded"
                );
                Ok(())
            }
            Err(error) => {
                self.readiness.mark_failed(error.to_string());
                warn!(
                    event_name = "oracle.load.failed",
                    correlation_id = "bootstrap",
                    model = %self.model,
                    error = %error,
                    "generation model failed to load"
                );
                Err(error)
            }
        }
    }

    async fn generate(&self, request: &GenerationRequest) -> Result<String> {
        let body = GenerateBody {
            model: &self.model,
            prompt: format_transcript(&request.system_prompt, &request.prompt),
            raw: true,
            stream: false,
            keep_alive: &self.keep_alive,
            options: GenerateOptions {
                num_predict: request.sampling.max_new_tokens,
                temperature: request.sampling.temperature,
                top_p: request.sampling.top_p,
                repeat_penalty: request.sampling.repetition_penalty,
                stop: [END_OF_TURN, END_OF_TEXT],
            },
        };

        let _permit = self.generation_lock.lock().await;
        let reply = self.post_generate(&body).await?;
        Ok(strip_control_tokens(&reply.response).trim().to_string())
    }
}

/// Llama-3 role-tagged transcript ending on an open assistant header.
pub fn format_transcript(system_prompt: &str, prompt: &str) -> String {
    format!(
        "<|begin_of_text|><|start_header_id|>system<|end_header_id|>\n\
         {system_prompt}{END_OF_TURN}\n\
         <|start_header_id|>user<|end_header_id|>\n\
         {prompt}{END_OF_TURN}\n\
         <|start_header_id|>assistant<|end_header_id|>\n"
    )
}

const CONTROL_TOKENS: [&str; 8] = [
    "<|begin_of_text|>",
    END_OF_TEXT,
    "<|start_header_id|>",
    "<|end_header_id|>",
    END_OF_TURN,
    "<|eom_id|>",
    "<|python_tag|>",
    "<|finetune_right_pad_id|>",
];
const RESERVED_TOKEN_PREFIX: &str = "<|reserved_special_token_";

/// Removes Llama-3 special tokens left in decoded output. Other text between
/// `<|` and `|>` is kept.
pub fn strip_control_tokens(text: &str) -> String {
    let mut output = String::with_capacity(text.len());
    let mut rest = text;

    while let Some(start) = rest.find("<|") {
        output.push_str(&rest[..start]);
        rest = &rest[start..];
        match control_token_len(rest) {
            Some(len) => rest = &rest[len..],
            None => {
                output.push_str("<|");
                rest = &rest[2..];
            }
        }
    }

    output.push_str(rest);
    output
}

fn control_token_len(text: &str) -> Option<usize> {
    if let Some(token) = CONTROL_TOKENS.iter().find(|token| text.starts_with(*token)) {
        return Some(token.len());
    }

    let digits = text.strip_prefix(RESERVED_TOKEN_PREFIX)?;
    let count = digits.bytes().take_while(u8::is_ascii_digit).count();
    (count > 0 && digits[count..].starts_with("|>"))
        .then_some(RESERVED_TOKEN_PREFIX.len() + count + 2)
}
