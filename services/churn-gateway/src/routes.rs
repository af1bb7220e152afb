//! HTTP surface. Every route answers 200; failures travel in the body.

use axum::body::Bytes;
use axum::extract::{FromRequest, Multipart, Request, State};
use axum::http::header;
use axum::response::{Html, IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::json;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use churn_core::AppConfig;

use crate::error::PredictError;
use crate::form::{self, FeatureRecord, SubmissionFormat};
use crate::gateway::ModelGateway;
use crate::render;
use crate::service::{Label, PredictionService};
use crate::training::{self, TrainingTrigger};

#[derive(Clone)]
pub struct AppState {
    pub predictor: Arc<PredictionService>,
    pub trainer: TrainingTrigger,
}

impl AppState {
    pub fn new(predictor: PredictionService, trainer: TrainingTrigger) -> Self {
        Self { predictor: Arc::new(predictor), trainer }
    }

    pub fn from_config(cfg: &AppConfig) -> Result<Self, PredictError> {
        let gateway = ModelGateway::from_config(&cfg.model)?;
        let trainer = TrainingTrigger::new(training::pipeline_from_config(&cfg.training));
        Ok(Self::new(PredictionService::new(gateway), trainer))
    }
}

pub fn router(state: AppState, static_dir: &str) -> Router {
    Router::new()
        .route("/", get(index).post(predict_form))
        .route("/train", get(train))
        .route("/api/predict", post(predict_json))
        .nest_service("/static", ServeDir::new(static_dir))
        .merge(churn_core::health_router())
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::very_permissive())
        .with_state(state)
}

async fn index() -> Html<String> { render::page(render::INITIAL_CONTEXT) }

async fn predict_form(State(state): State<AppState>, req: Request) -> Response {
    match form_submission(&state, req).await {
        Ok(label) => render::page(label.as_str()).into_response(),
        Err(e) => Json(json!({"status": false, "error": e.to_string()})).into_response(),
    }
}

/// `multipart/form-data` is streamed through the multipart reader; anything else is read as urlencoded.
async fn form_submission(state: &AppState, req: Request) -> Result<Label, PredictError> {
    let multipart = req
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|ct| ct.starts_with("multipart/form-data"));
    if multipart {
        let parts = Multipart::from_request(req, state).await.map_err(|e| PredictError::Decode(e.to_string()));
        return state
            .predictor
            .predict_decoded(async move { form::decode_multipart(parts?).await })
            .await;
    }
    match Bytes::from_request(req, state).await {
        Ok(body) => state.predictor.predict_submission(&body, SubmissionFormat::UrlEncoded).await,
        Err(e) => {
            let err = PredictError::Decode(e.to_string());
            state.predictor.predict_decoded(async move { Err::<FeatureRecord, _>(err) }).await
        }
    }
}

async fn predict_json(State(state): State<AppState>, body: Bytes) -> Json<serde_json::Value> {
    match state.predictor.predict_submission(&body, SubmissionFormat::Json).await {
        Ok(label) => Json(json!({"status": true, "prediction": label})),
        Err(e) => Json(json!({"status": false, "error": e.to_string(), "kind": e.kind()})),
    }
}

// 200 on failure too; callers read the body.
async fn train(State(state): State<AppState>) -> String { state.trainer.trigger().await.message() }
