//! Core shared utilities for the churn prediction services.

use anyhow::Result;
use tracing::info;
use once_cell::sync::OnceCell;
use axum::{routing::get, Router};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use prometheus::{Encoder, TextEncoder};
use std::sync::atomic::{AtomicBool, Ordering};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

pub mod config;
mod metrics_ext;

pub use config::{load_config, AppConfig, ArtifactCachePolicy, ModelConfig, StoreConfig, StoreKind, TrainingConfig};
pub use metrics_ext::{registry, PredictionMetrics, PREDICTION_METRICS};

static TRACING_INIT: OnceCell<()> = OnceCell::new();
static NODE_READINESS: AtomicBool = AtomicBool::new(false);
static SERVICE_INFO: OnceCell<serde_json::Value> = OnceCell::new();

pub fn mark_ready() { NODE_READINESS.store(true, Ordering::SeqCst); }
pub fn clear_ready() { NODE_READINESS.store(false, Ordering::SeqCst); }

/// Install the global subscriber. Safe to call more than once; only the first call wins.
pub fn init_tracing(service: &str) -> Result<()> {
    TRACING_INIT.get_or_try_init(|| -> Result<()> {
        let json = std::env::var("CHURN_JSON_LOG").ok().map(|v| v == "1" || v.eq_ignore_ascii_case("true")).unwrap_or(false);
        let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
        let registry = tracing_subscriber::registry().with(env_filter);
        if json {
            registry
                .with(tracing_subscriber::fmt::layer().json().flatten_event(true).with_current_span(true).with_span_list(false))
                .try_init()?;
        } else {
            registry
                .with(tracing_subscriber::fmt::layer().with_target(true).with_thread_ids(false).with_line_number(true))
                .try_init()?;
        }
        Ok(())
    })?;
    info!(service, "tracing initialized");
    Ok(())
}

/// Static facts surfaced on `/status` (service name, model location, ...). First call wins.
pub fn set_service_info(info: serde_json::Value) { let _ = SERVICE_INFO.set(info); }

/// Liveness, readiness, status and Prometheus scrape endpoints, meant to be merged into a service router.
pub fn health_router<S>() -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    Router::new()
        .route("/live", get(|| async { axum::Json(serde_json::json!({"live": true})) }))
        .route("/ready", get(|| async { axum::Json(serde_json::json!({"ready": NODE_READINESS.load(Ordering::SeqCst)})) }))
        .route("/status", get(|| async {
            axum::Json(serde_json::json!({
                "live": true,
                "ready": NODE_READINESS.load(Ordering::SeqCst),
                "service": SERVICE_INFO.get().cloned().unwrap_or(serde_json::Value::Null),
            }))
        }))
        .route("/metrics", get(metrics_handler))
}

async fn metrics_handler() -> Response {
    let metric_families = registry().gather();
    let mut buf = Vec::new();
    if let Err(e) = TextEncoder::new().encode(&metric_families, &mut buf) {
        return (StatusCode::INTERNAL_SERVER_ERROR, format!("encode error: {e}")).into_response();
    }
    ([(header::CONTENT_TYPE, "text/plain; version=0.0.4")], buf).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use tower::ServiceExt;

    #[tokio::test]
    async fn metrics_endpoint_lists_prediction_families() {
        PREDICTION_METRICS.requests_total.with_label_values(&["ok"]).inc();
        let app: Router = health_router();
        let resp = app.oneshot(Request::get("/metrics").body(Body::empty()).unwrap()).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let body = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        let text = String::from_utf8(body.to_vec()).unwrap();
        assert!(text.contains("churn_prediction_requests_total"));
    }

    #[tokio::test]
    async fn ready_reflects_flag() {
        mark_ready();
        let app: Router = health_router();
        let resp = app.oneshot(Request::get("/ready").body(Body::empty()).unwrap()).await.unwrap();
        let body = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        let v: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(v["ready"], true);
    }
}
