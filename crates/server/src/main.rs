mod api;
mod bootstrap;
mod health;

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use rahnuma_core::config::{AppConfig, LoadOptions};
use tokio::net::TcpListener;
use tokio::sync::Notify;
use tracing_subscriber::EnvFilter;

fn init_logging(config: &AppConfig) {
    use rahnuma_core::config::LogFormat::*;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.logging.level.as_str()));

    match config.logging.format {
        Compact => {
            tracing_subscriber::fmt().with_target(false).with_env_filter(filter).compact().init();
        }
        Pretty => {
            tracing_subscriber::fmt().with_target(false).with_env_filter(filter).pretty().init();
        }
        Json => {
            tracing_subscriber::fmt().with_target(false).with_env_filter(filter).json().init();
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    run().await
}

pub async fn run() -> Result<()> {
    // Logging comes up before bootstrap so its events are captured.
    let config = AppConfig::load(LoadOptions::default())?;
    init_logging(&config);

    let app = bootstrap::bootstrap_with_config(config).await?;
    bootstrap::spawn_oracle_load(Arc::clone(&app.oracle));

    let server = &app.config.server;
    let address = format!("{}:{}", server.bind_address, server.port);
    let listener =
        TcpListener::bind(&address).await.with_context(|| format!("binding {address}"))?;

    let router = api::router(Arc::clone(&app.runtime), server.ui_dir.as_deref());

    tracing::info!(
        event_name = "system.server.started",
        correlation_id = "bootstrap",
        address = %address,
        model = %app.config.oracle.model,
        "rahnuma-server listening"
    );

    let shutdown = Arc::new(Notify::new());
    let signal = Arc::clone(&shutdown);
    let serve = axum::serve(listener, router).with_graceful_shutdown(async move {
        signal.notified().await;
    });
    let mut serve = tokio::spawn(async move { serve.await });

    tokio::select! {
        result = &mut serve => {
            result??;
            return Ok(());
        }
        signal = wait_for_shutdown() => signal?,
    }

    tracing::info!(
        event_name = "system.server.stopping",
        correlation_id = "shutdown",
        drain_secs = server.graceful_shutdown_secs,
        "rahnuma-server stopping"
    );
    shutdown.notify_one();

    let drain = Duration::from_secs(server.graceful_shutdown_secs);
    match tokio::time::timeout(drain, serve).await {
        Ok(result) => result??,
        Err(_) => tracing::warn!(
            event_name = "system.server.drain_timeout",
            correlation_id = "shutdown",
            "in-flight requests did not finish before the drain deadline"
        ),
    }

    Ok(())
}

async fn wait_for_shutdown() -> Result<()> {
    tokio::signal::ctrl_c().await?;
    Ok(())
}
