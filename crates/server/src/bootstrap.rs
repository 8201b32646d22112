use std::sync::Arc;

use rahnuma_agent::{llm::GenerationOracle, ollama::OllamaOracle, runtime::AgentRuntime};
use rahnuma_core::config::{AppConfig, ConfigError, LoadOptions};
use thiserror::Error;
use tokio::task::JoinHandle;
use tracing::{error, info};

pub struct Application {
    pub config: AppConfig,
    pub oracle: Arc<dyn GenerationOracle>,
    pub runtime: Arc<AgentRuntime>,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("oracle client setup failed: {0}")]
    OracleClient(String),
}

pub async fn bootstrap(options: LoadOptions) -> Result<Application, BootstrapError> {
    info!(
        event_name = "system.bootstrap.start",
        correlation_id = "bootstrap",
        "starting application bootstrap"
    );
    let config = AppConfig::load(options)?;
    bootstrap_with_config(config).await
}

pub async fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    let oracle = OllamaOracle::new(&config.oracle)
        .map_err(|error| BootstrapError::OracleClient(error.to_string()))?;
    info!(
        event_name = "system.bootstrap.oracle_configured",
        correlation_id = "bootstrap",
        base_url = oracle.base_url(),
        model = oracle.model(),
        "oracle client configured"
    );

    let oracle: Arc<dyn GenerationOracle> = Arc::new(oracle);
    Ok(assemble(config, oracle))
}

/// Wires a runtime around an already-built oracle.
pub fn assemble(config: AppConfig, oracle: Arc<dyn GenerationOracle>) -> Application {
    let runtime = Arc::new(AgentRuntime::new(Arc::clone(&oracle), &config.pipeline));
    Application { config, oracle, runtime }
}

/// Starts the model load in the background.
///
/// Requests arriving before it finishes are answered with 503.
pub fn spawn_oracle_load(oracle: Arc<dyn GenerationOracle>) -> JoinHandle<()> {
    tokio::spawn(async move {
        if let Err(load_error) = oracle.load().await {
            error!(
                event_name = "system.bootstrap.oracle_load_failed",
                correlation_id = "bootstrap",
                error = %load_error,
                "model load failed; generation stays unavailable"
            );
        }
    })
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use rahnuma_agent::fixtures::ScriptedOracle;
    use rahnuma_agent::llm::{GenerationOracle, OracleReadiness};
    use rahnuma_core::config::{AppConfig, ConfigOverrides, LoadOptions};

    use crate::bootstrap::{assemble, bootstrap, spawn_oracle_load};

    #[tokio::test]
    async fn bootstrap_rejects_invalid_oracle_url() {
        let result = bootstrap(LoadOptions {
            overrides: ConfigOverrides {
                oracle_base_url: Some("ftp://models.local".to_string()),
                ..ConfigOverrides::default()
            },
            ..LoadOptions::default()
        })
        .await;

        let message = result.err().expect("error").to_string();
        assert!(message.contains("oracle.base_url"));
    }

    #[tokio::test]
    async fn bootstrap_starts_uninitialized_with_valid_config() {
        let app = bootstrap(LoadOptions {
            overrides: ConfigOverrides {
                oracle_base_url: Some("http://127.0.0.1:9".to_string()),
                ..ConfigOverrides::default()
            },
            ..LoadOptions::default()
        })
        .await
        .expect("bootstrap should succeed without contacting the backend");

        assert_eq!(app.oracle.readiness(), OracleReadiness::Uninitialized);
        assert_eq!(app.config.server.port, 8001);
    }

    #[tokio::test]
    async fn background_load_marks_oracle_ready() {
        let scripted = Arc::new(ScriptedOracle::default());
        let app = assemble(AppConfig::default(), scripted.clone());

        spawn_oracle_load(Arc::clone(&app.oracle)).await.expect("load task joins");

        assert!(scripted.readiness().is_ready());
        let reply = app.runtime.handle_message("سلام", Vec::new()).await.expect("reply");
        assert_eq!(reply, ScriptedOracle::FALLBACK_REPLY);
    }

    #[tokio::test]
    async fn background_load_failure_is_recorded_not_raised() {
        let scripted = Arc::new(ScriptedOracle::failing_load());

        spawn_oracle_load(scripted.clone()).await.expect("load task joins");

        assert!(matches!(scripted.readiness(), OracleReadiness::Failed(_)));
    }
}
