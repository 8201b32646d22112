use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub oracle: OracleConfig,
    pub server: ServerConfig,
    pub pipeline: PipelineConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug)]
pub struct OracleConfig {
    pub base_url: String,
    pub model: String,
    pub api_key: Option<SecretString>,
    pub timeout_secs: u64,
    pub keep_alive: String,
}

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub bind_address: String,
    pub port: u16,
    pub ui_dir: Option<PathBuf>,
    pub graceful_shutdown_secs: u64,
}

/// Sampling budgets used by the chat pipeline stages.
#[derive(Clone, Debug, PartialEq)]
pub struct PipelineConfig {
    pub generation: SamplingConfig,
    pub classifier: SamplingConfig,
}

#[derive(Clone, Debug, PartialEq)]
pub struct SamplingConfig {
    pub max_new_tokens: u32,
    pub temperature: f32,
    pub top_p: f32,
    pub repetition_penalty: Option<f32>,
}

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub oracle_base_url: Option<String>,
    pub oracle_model: Option<String>,
    pub oracle_api_key: Option<String>,
    pub server_port: Option<u16>,
    pub ui_dir: Option<PathBuf>,
    pub log_level: Option<String>,
}

#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub config_path: Option<PathBuf>,
    pub require_file: bool,
    pub overrides: ConfigOverrides,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse config file `{path}`: {source}")]
    ParseFile { path: PathBuf, source: toml::de::Error },
    #[error("required config file was not found: `{0}`")]
    MissingConfigFile(PathBuf),
    #[error("environment variable interpolation failed for `{var}`")]
    MissingEnvInterpolation { var: String },
    #[error("unterminated environment interpolation expression")]
    UnterminatedInterpolation,
    #[error("invalid environment override for `{key}`: `{value}`")]
    InvalidEnvOverride { key: String, value: String },
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            oracle: OracleConfig {
                base_url: "http://localhost:11434".to_string(),
                model: "qalb-1.0-8b-instruct".to_string(),
                api_key: None,
                timeout_secs: 120,
                keep_alive: "30m".to_string(),
            },
            server: ServerConfig {
                bind_address: "0.0.0.0".to_string(),
                port: 8001,
                ui_dir: Some(PathBuf::from("ui")),
                graceful_shutdown_secs: 15,
            },
            pipeline: PipelineConfig::default(),
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
        }
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            generation: SamplingConfig {
                max_new_tokens: 250,
                temperature: 0.4,
                top_p: 0.9,
                repetition_penalty: Some(1.1),
            },
            classifier: SamplingConfig {
                max_new_tokens: 10,
                temperature: 0.1,
                top_p: 0.9,
                repetition_penalty: Some(1.1),
            },
        }
    }
}

fn secret_value(value: String) -> SecretString {
    value.into()
}

impl std::str::FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(ConfigError::Validation(format!(
                "unsupported log format `{other}` (expected compact|pretty|json)"
            ))),
        }
    }
}

impl AppConfig {
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let maybe_path = resolve_config_path(options.config_path.as_deref());

        if let Some(path) = maybe_path {
            let patch = read_patch(&path)?;
            config.apply_patch(patch);
        } else if options.require_file {
            let expected = options.config_path.unwrap_or_else(|| PathBuf::from("rahnuma.toml"));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.validate()?;

        Ok(config)
    }

    fn apply_patch(&mut self, patch: ConfigPatch) {
        if let Some(oracle) = patch.oracle {
            if let Some(base_url) = oracle.base_url {
                self.oracle.base_url = base_url;
            }
            if let Some(model) = oracle.model {
                self.oracle.model = model;
            }
            if let Some(oracle_api_key_value) = oracle.api_key {
                self.oracle.api_key = Some(secret_value(oracle_api_key_value));
            }
            if let Some(timeout_secs) = oracle.timeout_secs {
                self.oracle.timeout_secs = timeout_secs;
            }
            if let Some(keep_alive) = oracle.keep_alive {
                self.oracle.keep_alive = keep_alive;
            }
        }

        if let Some(server) = patch.server {
            if let Some(bind_address) = server.bind_address {
                self.server.bind_address = bind_address;
            }
            if let Some(port) = server.port {
                self.server.port = port;
            }
            if let Some(ui_dir) = server.ui_dir {
                self.server.ui_dir = Some(ui_dir);
            }
            if let Some(graceful_shutdown_secs) = server.graceful_shutdown_secs {
                self.server.graceful_shutdown_secs = graceful_shutdown_secs;
            }
        }

        if let Some(pipeline) = patch.pipeline {
            if let Some(generation) = pipeline.generation {
                generation.apply_to(&mut self.pipeline.generation);
            }
            if let Some(classifier) = pipeline.classifier {
                classifier.apply_to(&mut self.pipeline.classifier);
            }
        }

        if let Some(logging) = patch.logging {
            if let Some(level) = logging.level {
                self.logging.level = level;
            }
            if let Some(format) = logging.format {
                self.logging.format = format;
            }
        }
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Some(value) = read_env("RAHNUMA_ORACLE_BASE_URL") {
            self.oracle.base_url = value;
        }
        if let Some(value) = read_env("RAHNUMA_ORACLE_MODEL") {
            self.oracle.model = value;
        }
        if let Some(value) = read_env("RAHNUMA_ORACLE_API_KEY") {
            self.oracle.api_key = Some(secret_value(value));
        }
        if let Some(value) = read_env("RAHNUMA_ORACLE_TIMEOUT_SECS") {
            self.oracle.timeout_secs = parse_u64("RAHNUMA_ORACLE_TIMEOUT_SECS", &value)?;
        }
        if let Some(value) = read_env("RAHNUMA_ORACLE_KEEP_ALIVE") {
            self.oracle.keep_alive = value;
        }

        if let Some(value) = read_env("RAHNUMA_SERVER_BIND_ADDRESS") {
            self.server.bind_address = value;
        }
        if let Some(value) = read_env("RAHNUMA_SERVER_PORT") {
            self.server.port = parse_u16("RAHNUMA_SERVER_PORT", &value)?;
        }
        if let Some(value) = read_env("RAHNUMA_SERVER_UI_DIR") {
            self.server.ui_dir = Some(PathBuf::from(value));
        }
        if let Some(value) = read_env("RAHNUMA_SERVER_GRACEFUL_SHUTDOWN_SECS") {
            self.server.graceful_shutdown_secs =
                parse_u64("RAHNUMA_SERVER_GRACEFUL_SHUTDOWN_SECS", &value)?;
        }

        if let Some(value) = read_env("RAHNUMA_PIPELINE_MAX_NEW_TOKENS") {
            self.pipeline.generation.max_new_tokens =
                parse_u32("RAHNUMA_PIPELINE_MAX_NEW_TOKENS", &value)?;
        }
        if let Some(value) = read_env("RAHNUMA_PIPELINE_TEMPERATURE") {
            self.pipeline.generation.temperature =
                parse_f32("RAHNUMA_PIPELINE_TEMPERATURE", &value)?;
        }

        let log_level = read_env("RAHNUMA_LOGGING_LEVEL").or_else(|| read_env("RAHNUMA_LOG_LEVEL"));
        if let Some(value) = log_level {
            self.logging.level = value;
        }
        let log_format =
            read_env("RAHNUMA_LOGGING_FORMAT").or_else(|| read_env("RAHNUMA_LOG_FORMAT"));
        if let Some(value) = log_format {
            self.logging.format = value.parse()?;
        }

        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(base_url) = overrides.oracle_base_url {
            self.oracle.base_url = base_url;
        }
        if let Some(model) = overrides.oracle_model {
            self.oracle.model = model;
        }
        if let Some(api_key) = overrides.oracle_api_key {
            self.oracle.api_key = Some(secret_value(api_key));
        }
        if let Some(port) = overrides.server_port {
            self.server.port = port;
        }
        if let Some(ui_dir) = overrides.ui_dir {
            self.server.ui_dir = Some(ui_dir);
        }
        if let Some(log_level) = overrides.log_level {
            self.logging.level = log_level;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_oracle(&self.oracle)?;
        validate_server(&self.server)?;
        validate_sampling("pipeline.generation", &self.pipeline.generation)?;
        validate_sampling("pipeline.classifier", &self.pipeline.classifier)?;
        if self.pipeline.classifier.max_new_tokens > MAX_CLASSIFIER_TOKENS {
            return Err(ConfigError::Validation(format!(
                "pipeline.classifier.max_new_tokens must be in range 1..={MAX_CLASSIFIER_TOKENS}"
            )));
        }
        validate_logging(&self.logging)?;
        Ok(())
    }
}

fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    [PathBuf::from("rahnuma.toml"), PathBuf::from("config/rahnuma.toml")]
        .into_iter()
        .find(|path| path.exists())
}

fn read_patch(path: &Path) -> Result<ConfigPatch, ConfigError> {
    let raw = fs::read_to_string(path)
        .map_err(|source| ConfigError::ReadFile { path: path.to_path_buf(), source })?;

    let interpolated = interpolate_env_vars(&raw)?;
    toml::from_str::<ConfigPatch>(&interpolated)
        .map_err(|source| ConfigError::ParseFile { path: path.to_path_buf(), source })
}

fn interpolate_env_vars(input: &str) -> Result<String, ConfigError> {
    let mut output = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && matches!(chars.peek(), Some('{')) {
            chars.next();
            let mut key = String::new();

            loop {
                match chars.next() {
                    Some('}') => break,
                    Some(next) => key.push(next),
                    None => return Err(ConfigError::UnterminatedInterpolation),
                }
            }

            let value = env::var(&key)
                .map_err(|_| ConfigError::MissingEnvInterpolation { var: key.clone() })?;
            output.push_str(&value);
            continue;
        }

        output.push(ch);
    }

    Ok(output)
}

fn validate_oracle(oracle: &OracleConfig) -> Result<(), ConfigError> {
    let base_url = oracle.base_url.trim();
    if !base_url.starts_with("http://") && !base_url.starts_with("https://") {
        return Err(ConfigError::Validation(
            "oracle.base_url must start with http:// or https://".to_string(),
        ));
    }

    if oracle.model.trim().is_empty() {
        return Err(ConfigError::Validation(
            "oracle.model is required (the model tag served by the generation backend)"
                .to_string(),
        ));
    }

    if oracle.timeout_secs == 0 || oracle.timeout_secs > 600 {
        return Err(ConfigError::Validation(
            "oracle.timeout_secs must be in range 1..=600".to_string(),
        ));
    }

    if let Some(api_key) = &oracle.api_key {
        if api_key.expose_secret().trim().is_empty() {
            return Err(ConfigError::Validation(
                "oracle.api_key must not be blank when set".to_string(),
            ));
        }
    }

    Ok(())
}

fn validate_server(server: &ServerConfig) -> Result<(), ConfigError> {
    if server.port == 0 {
        return Err(ConfigError::Validation("server.port must be greater than zero".to_string()));
    }

    if server.graceful_shutdown_secs == 0 {
        return Err(ConfigError::Validation(
            "server.graceful_shutdown_secs must be greater than zero".to_string(),
        ));
    }

    Ok(())
}

/// Upper bound for the one-word intent label.
const MAX_CLASSIFIER_TOKENS: u32 = 10;

fn validate_sampling(section: &str, sampling: &SamplingConfig) -> Result<(), ConfigError> {
    if sampling.max_new_tokens == 0 {
        return Err(ConfigError::Validation(format!(
            "{section}.max_new_tokens must be greater than zero"
        )));
    }
    if !(sampling.temperature > 0.0 && sampling.temperature <= 2.0) {
        return Err(ConfigError::Validation(format!(
            "{section}.temperature must be in range (0, 2]"
        )));
    }
    if !(sampling.top_p > 0.0 && sampling.top_p <= 1.0) {
        return Err(ConfigError::Validation(format!("{section}.top_p must be in range (0, 1]")));
    }
    if let Some(penalty) = sampling.repetition_penalty {
        if penalty <= 0.0 {
            return Err(ConfigError::Validation(format!(
                "{section}.repetition_penalty must be greater than zero"
            )));
        }
    }

    Ok(())
}

fn validate_logging(logging: &LoggingConfig) -> Result<(), ConfigError> {
    let level = logging.level.trim().to_ascii_lowercase();
    match level.as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
        _ => Err(ConfigError::Validation(
            "logging.level must be one of trace|debug|info|warn|error".to_string(),
        )),
    }
}

fn read_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn parse_u16(key: &str, value: &str) -> Result<u16, ConfigError> {
    value.parse::<u16>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_u32(key: &str, value: &str) -> Result<u32, ConfigError> {
    value.parse::<u32>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_u64(key: &str, value: &str) -> Result<u64, ConfigError> {
    value.parse::<u64>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_f32(key: &str, value: &str) -> Result<f32, ConfigError> {
    value.parse::<f32>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    oracle: Option<OraclePatch>,
    server: Option<ServerPatch>,
    pipeline: Option<PipelinePatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct OraclePatch {
    base_url: Option<String>,
    model: Option<String>,
    api_key: Option<String>,
    timeout_secs: Option<u64>,
    keep_alive: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct ServerPatch {
    bind_address: Option<String>,
    port: Option<u16>,
    ui_dir: Option<PathBuf>,
    graceful_shutdown_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct PipelinePatch {
    generation: Option<SamplingPatch>,
    classifier: Option<SamplingPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct SamplingPatch {
    max_new_tokens: Option<u32>,
    temperature: Option<f32>,
    top_p: Option<f32>,
    repetition_penalty: Option<f32>,
}

impl SamplingPatch {
    fn apply_to(self, target: &mut SamplingConfig) {
        if let Some(max_new_tokens) = self.max_new_tokens {
            target.max_new_tokens = max_new_tokens;
        }
        if let Some(temperature) = self.temperature {
            target.temperature = temperature;
        }
        if let Some(top_p) = self.top_p {
            target.top_p = top_p;
        }
        if let Some(repetition_penalty) = self.repetition_penalty {
            target.repetition_penalty = Some(repetition_penalty);
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}
