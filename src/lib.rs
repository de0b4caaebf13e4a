mod commands;
pub mod config;
pub mod error;
pub mod models;
pub mod scope_path;
pub mod services;
pub mod state;

use std::sync::Arc;

use anyhow::Context;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};

use commands::{file_commands, organize_commands};
use config::Config;
use scope_path::SandboxRoot;
use services::organize_service::Synthesizer;
use services::{file_service, llm_service};
use state::AppState;

async fn health() -> Json<Value> {
    Json(json!({"ok": true}))
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/filesystem", get(file_commands::browse_root))
        .route("/filesystem/*path", get(file_commands::browse))
        .route("/scan", post(file_commands::scan))
        .route("/detect-garbage", post(file_commands::detect_garbage))
        .route("/organize", post(organize_commands::organize))
        .route("/preview", post(organize_commands::preview))
        .route("/apply", post(organize_commands::apply))
        .route("/reset", post(organize_commands::reset))
        .with_state(state)
}

/// Prepares the sandbox and builds the shared state. Failing here is fatal.
pub fn init_state(config: &Config) -> anyhow::Result<AppState> {
    let sandbox = SandboxRoot::prepare(&config.sandbox_root).with_context(|| {
        format!(
            "failed to prepare sandbox at {}",
            config.sandbox_root.display()
        )
    })?;
    let seeded = file_service::seed_if_empty(&sandbox, &config.template_dir)
        .context("failed to seed sandbox from template")?;
    if seeded > 0 {
        tracing::info!(files = seeded, "seeded empty sandbox from template");
    }

    let synthesizer = Synthesizer::new(
        llm_service::tiers_from_config(config).context("failed to build external clients")?,
    );
    tracing::info!(
        tiers = ?synthesizer.tier_names(),
        "plan synthesis tiers ready (heuristic fallback always enabled)"
    );

    Ok(AppState::new(
        sandbox,
        config.template_dir.clone(),
        synthesizer,
    ))
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("failed to listen for shutdown signal: {e}");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutting down");
}

pub async fn run(config: Config) -> anyhow::Result<()> {
    let state = Arc::new(init_state(&config)?);
    tracing::info!(root = %state.sandbox.path().display(), "sandbox ready");

    let listener = tokio::net::TcpListener::bind(&config.bind)
        .await
        .with_context(|| format!("failed to bind {}", config.bind))?;
    tracing::info!("listening on {}", config.bind);

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;
    Ok(())
}
