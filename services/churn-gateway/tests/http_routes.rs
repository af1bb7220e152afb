use anyhow::bail;
use async_trait::async_trait;
use axum::body::{to_bytes, Body};
use axum::http::{header, Request, StatusCode};
use axum::Router;
use std::path::PathBuf;
use std::sync::Arc;
use tower::ServiceExt;

use churn_core::ArtifactCachePolicy;
use churn_gateway::form::FEATURE_COLUMNS;
use churn_gateway::gateway::ModelGateway;
use churn_gateway::routes::{router, AppState};
use churn_gateway::service::PredictionService;
use churn_gateway::store::{ArtifactLocation, FsObjectStore};
use churn_gateway::training::{TrainingPipeline, TrainingTrigger};

const FULL_FORM: &str = "credit_score=608&France=0&Germany=0&Spain=1&gender=0&age=41&tenure=1&balance=83807.86&products_number=1&credit_card=0&active_member=1&estimated_salary=112542.58";

struct FakePipeline { fail_with: Option<&'static str> }

#[async_trait]
impl TrainingPipeline for FakePipeline {
    async fn run(&self) -> anyhow::Result<()> {
        match self.fail_with {
            Some(msg) => bail!("{msg}"),
            None => Ok(()),
        }
    }
}

/// Artifact directory removed when the test ends.
struct ArtifactRoot(PathBuf);

impl ArtifactRoot {
    fn with_intercept(intercept: f64) -> Self {
        let root = Self::empty();
        std::fs::create_dir_all(root.0.join("churn-model-store")).unwrap();
        let artifact = serde_json::json!({
            "feature_names": FEATURE_COLUMNS,
            "estimator": { "kind": "logistic", "coefficients": vec![0.0; 12], "intercept": intercept }
        });
        std::fs::write(root.0.join("churn-model-store/model.json"), artifact.to_string()).unwrap();
        root
    }

    fn empty() -> Self { ArtifactRoot(std::env::temp_dir().join(format!("churn-routes-{}", uuid::Uuid::new_v4()))) }

    fn app(&self, training_error: Option<&'static str>) -> Router {
        let store = Arc::new(FsObjectStore::new(&self.0));
        let gateway = ModelGateway::new(store, ArtifactLocation::new("churn-model-store", "model.json"), ArtifactCachePolicy::PerInstance);
        let trainer = TrainingTrigger::new(Arc::new(FakePipeline { fail_with: training_error }));
        let state = AppState::new(PredictionService::new(gateway), trainer);
        router(state, concat!(env!("CARGO_MANIFEST_DIR"), "/static"))
    }
}

impl Drop for ArtifactRoot {
    fn drop(&mut self) { let _ = std::fs::remove_dir_all(&self.0); }
}

async fn send(app: Router, req: Request<Body>) -> (StatusCode, String) {
    let resp = app.oneshot(req).await.unwrap();
    let status = resp.status();
    let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    (status, String::from_utf8(bytes.to_vec()).unwrap())
}

fn form_post(body: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/")
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn multipart_post(form: &str) -> Request<Body> {
    let boundary = "churn-boundary";
    let mut body = String::new();
    for (key, value) in form.split('&').filter_map(|kv| kv.split_once('=')) {
        body.push_str(&format!("--{boundary}\r\nContent-Disposition: form-data; name=\"{key}\"\r\n\r\n{value}\r\n"));
    }
    body.push_str(&format!("--{boundary}--\r\n"));
    Request::builder()
        .method("POST")
        .uri("/")
        .header(header::CONTENT_TYPE, format!("multipart/form-data; boundary={boundary}"))
        .body(Body::from(body))
        .unwrap()
}

#[tokio::test]
async fn index_renders_placeholder() {
    let root = ArtifactRoot::with_intercept(-4.0);
    let (status, body) = send(root.app(None), Request::get("/").body(Body::empty()).unwrap()).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.contains(r#"id="result">Rendering</section>"#), "{body}");
}

#[tokio::test]
async fn full_form_renders_exactly_one_label() {
    let no = ArtifactRoot::with_intercept(-4.0);
    let (status, body) = send(no.app(None), form_post(FULL_FORM)).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.contains("Churn-No"));
    assert!(!body.contains("Churn-Yes"));

    let yes = ArtifactRoot::with_intercept(4.0);
    let (_, body) = send(yes.app(None), form_post(FULL_FORM)).await;
    assert!(body.contains("Churn-Yes"));
    assert!(!body.contains("Churn-No"));
}

#[tokio::test]
async fn multipart_form_is_accepted() {
    let root = ArtifactRoot::with_intercept(4.0);
    let (status, body) = send(root.app(None), multipart_post(FULL_FORM)).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.contains(r#"id="result">Churn-Yes</section>"#), "{body}");

    let partial = FULL_FORM.replace("&tenure=1", "");
    let (_, body) = send(root.app(None), multipart_post(&partial)).await;
    let v: serde_json::Value = serde_json::from_str(&body).unwrap();
    assert_eq!(v["status"], false);
    assert!(v["error"].as_str().unwrap().contains("tenure"), "{v}");
}

#[tokio::test]
async fn missing_field_answers_json_error_with_200() {
    let root = ArtifactRoot::with_intercept(-4.0);
    let partial = FULL_FORM.replace("&tenure=1", "");
    let (status, body) = send(root.app(None), form_post(&partial)).await;
    assert_eq!(status, StatusCode::OK);
    let v: serde_json::Value = serde_json::from_str(&body).unwrap();
    assert_eq!(v["status"], false);
    assert!(v["error"].as_str().unwrap().contains("tenure"), "{v}");
}

#[tokio::test]
async fn missing_artifact_answers_json_error() {
    let root = ArtifactRoot::empty();
    let (status, body) = send(root.app(None), form_post(FULL_FORM)).await;
    assert_eq!(status, StatusCode::OK);
    let v: serde_json::Value = serde_json::from_str(&body).unwrap();
    assert_eq!(v["status"], false);
}

#[tokio::test]
async fn train_reports_success_and_failure_with_200() {
    let root = ArtifactRoot::with_intercept(-4.0);
    let (status, body) = send(root.app(None), Request::get("/train").body(Body::empty()).unwrap()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "Training successful!!!");

    let (status, body) = send(root.app(Some("no data")), Request::get("/train").body(Body::empty()).unwrap()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "Error Occurred! no data");
}

#[tokio::test]
async fn json_api_returns_prediction_or_kind() {
    let root = ArtifactRoot::with_intercept(4.0);
    let record = serde_json::json!({
        "credit_score": 608, "France": 0, "Germany": 0, "Spain": 1, "gender": 0, "age": 41,
        "tenure": 1, "balance": 83807.86, "products_number": 1, "credit_card": 0,
        "active_member": 1, "estimated_salary": 112542.58
    });
    let req = Request::post("/api/predict")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(record.to_string()))
        .unwrap();
    let (_, body) = send(root.app(None), req).await;
    let v: serde_json::Value = serde_json::from_str(&body).unwrap();
    assert_eq!(v, serde_json::json!({"status": true, "prediction": "Churn-Yes"}));

    let req = Request::post("/api/predict").body(Body::from("{not json")).unwrap();
    let (status, body) = send(root.app(None), req).await;
    assert_eq!(status, StatusCode::OK);
    let v: serde_json::Value = serde_json::from_str(&body).unwrap();
    assert_eq!(v["status"], false);
    assert_eq!(v["kind"], "decode");
}

#[tokio::test]
async fn stylesheet_and_metrics_are_served() {
    let root = ArtifactRoot::with_intercept(-4.0);
    let (status, css) = send(root.app(None), Request::get("/static/css/style.css").body(Body::empty()).unwrap()).await;
    assert_eq!(status, StatusCode::OK);
    assert!(!css.is_empty());

    let _ = send(root.app(None), form_post(FULL_FORM)).await;
    let (status, text) = send(root.app(None), Request::get("/metrics").body(Body::empty()).unwrap()).await;
    assert_eq!(status, StatusCode::OK);
    assert!(text.contains("churn_prediction_requests_total"));
}
