//! Churn prediction web front end: form page, prediction, training trigger.

use anyhow::Result;
use tracing::info;

use churn_core::{clear_ready, init_tracing, load_config, mark_ready, set_service_info};

pub mod error;
pub mod form;
pub mod gateway;
pub mod lifecycle;
pub mod model;
pub mod render;
pub mod routes;
pub mod service;
pub mod store;
pub mod table;
pub mod training;

pub const SERVICE_NAME: &str = "churn-gateway";

pub async fn run() -> Result<()> {
    init_tracing(SERVICE_NAME)?;
    let cfg = load_config(SERVICE_NAME)?;
    info!(addr = %cfg.bind_address(), model = %cfg.model.file_path, "config loaded");

    let state = routes::AppState::from_config(&cfg)?;
    set_service_info(serde_json::json!({
        "name": cfg.service_name,
        "model": state.predictor.gateway().location().to_string(),
        "cache_policy": state.predictor.gateway().policy(),
        "training_configured": cfg.training.program.is_some(),
    }));

    let app = routes::router(state, &cfg.static_dir);
    let listener = tokio::net::TcpListener::bind(cfg.bind_address()).await?;
    mark_ready();
    info!(addr = %listener.local_addr()?, "listening");
    axum::serve(listener, app).with_graceful_shutdown(shutdown_signal()).await?;
    clear_ready();
    info!("stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "ctrl_c handler failed");
    }
    clear_ready();
    info!("shutdown requested");
}
