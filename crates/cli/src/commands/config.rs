use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use rahnuma_core::config::{AppConfig, LoadOptions};
use secrecy::{ExposeSecret, SecretString};
use toml::Value;

struct SourceLookup {
    file_path: Option<PathBuf>,
    file_doc: Option<Value>,
}

impl SourceLookup {
    fn detect() -> Self {
        let file_path = detect_config_path();
        let file_doc = load_config_file_doc(file_path.as_deref());
        Self { file_path, file_doc }
    }

    fn line(&self, key_path: &str, value: &str, env_keys: &[&str]) -> String {
        render_line(key_path, value, self.source(key_path, env_keys))
    }

    fn source(&self, key_path: &str, env_keys: &[&str]) -> String {
        if let Some(env_key) = env_keys.iter().find(|key| env::var_os(key).is_some()) {
            return format!("env ({env_key})");
        }

        if let Some(doc) = &self.file_doc {
            if contains_path(doc, key_path) {
                let file_path = self
                    .file_path
                    .as_ref()
                    .map(|path| path.display().to_string())
                    .unwrap_or_else(|| "config file".to_string());
                return format!("file ({file_path})");
            }
        }

        "default".to_string()
    }
}

pub fn run() -> String {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => return format!("config validation failed: {error}"),
    };
    let sources = SourceLookup::detect();

    let generation = &config.pipeline.generation;
    let classifier = &config.pipeline.classifier;

    let lines = vec![
        "effective config (source precedence: env > file > default):".to_string(),
        sources.line("oracle.base_url", &config.oracle.base_url, &["RAHNUMA_ORACLE_BASE_URL"]),
        sources.line("oracle.model", &config.oracle.model, &["RAHNUMA_ORACLE_MODEL"]),
        sources.line(
            "oracle.api_key",
            &redact_key(config.oracle.api_key.as_ref()),
            &["RAHNUMA_ORACLE_API_KEY"],
        ),
        sources.line(
            "oracle.timeout_secs",
            &config.oracle.timeout_secs.to_string(),
            &["RAHNUMA_ORACLE_TIMEOUT_SECS"],
        ),
        sources.line("oracle.keep_alive", &config.oracle.keep_alive, &["RAHNUMA_ORACLE_KEEP_ALIVE"]),
        sources.line(
            "server.bind_address",
            &config.server.bind_address,
            &["RAHNUMA_SERVER_BIND_ADDRESS"],
        ),
        sources.line("server.port", &config.server.port.to_string(), &["RAHNUMA_SERVER_PORT"]),
        sources.line(
            "server.ui_dir",
            &config
                .server
                .ui_dir
                .as_ref()
                .map(|dir| dir.display().to_string())
                .unwrap_or_else(|| "<unset>".to_string()),
            &["RAHNUMA_SERVER_UI_DIR"],
        ),
        sources.line(
            "server.graceful_shutdown_secs",
            &config.server.graceful_shutdown_secs.to_string(),
            &["RAHNUMA_SERVER_GRACEFUL_SHUTDOWN_SECS"],
        ),
        sources.line(
            "pipeline.generation.max_new_tokens",
            &generation.max_new_tokens.to_string(),
            &["RAHNUMA_PIPELINE_MAX_NEW_TOKENS"],
        ),
        sources.line(
            "pipeline.generation.temperature",
            &generation.temperature.to_string(),
            &["RAHNUMA_PIPELINE_TEMPERATURE"],
        ),
        sources.line("pipeline.generation.top_p", &generation.top_p.to_string(), &[]),
        sources.line(
            "pipeline.classifier.max_new_tokens",
            &classifier.max_new_tokens.to_string(),
            &[],
        ),
        sources.line("pipeline.classifier.temperature", &classifier.temperature.to_string(), &[]),
        sources.line(
            "logging.level",
            &config.logging.level,
            &["RAHNUMA_LOGGING_LEVEL", "RAHNUMA_LOG_LEVEL"],
        ),
        sources.line(
            "logging.format",
            &format!("{:?}", config.logging.format),
            &["RAHNUMA_LOGGING_FORMAT", "RAHNUMA_LOG_FORMAT"],
        ),
    ];

    lines.join("\n")
}

fn detect_config_path() -> Option<PathBuf> {
    [PathBuf::from("rahnuma.toml"), PathBuf::from("config/rahnuma.toml")]
        .into_iter()
        .find(|path| path.exists())
}

fn load_config_file_doc(path: Option<&Path>) -> Option<Value> {
    let path = path?;
    let raw = fs::read_to_string(path).ok()?;
    raw.parse::<Value>().ok()
}

fn contains_path(root: &Value, key_path: &str) -> bool {
    let mut current = root;
    for key in key_path.split('.') {
        let Some(next) = current.get(key) else {
            return false;
        };
        current = next;
    }
    true
}

fn render_line(key: &str, value: &str, source: String) -> String {
    format!("- {key} = {value} (source: {source})")
}

fn redact_key(key: Option<&SecretString>) -> String {
    let Some(key) = key else {
        return "<unset>".to_string();
    };
    let trimmed = key.expose_secret().trim();
    if trimmed.is_empty() {
        return "<empty>".to_string();
    }

    if let Some((prefix, _)) = trimmed.split_once('-') {
        return format!("{prefix}-***");
    }

    "<redacted>".to_string()
}
