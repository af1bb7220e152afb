use serde::Serialize;
use std::fmt;
use std::future::Future;
use tracing::{debug, info, instrument, warn};

use churn_core::PREDICTION_METRICS;

use crate::error::PredictError;
use crate::form::{self, FeatureRecord, SubmissionFormat};
use crate::gateway::ModelGateway;
use crate::lifecycle::{RequestLifecycle, RequestPhase};
use crate::table::TabularRow;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Label {
    #[serde(rename = "Churn-Yes")]
    ChurnYes,
    #[serde(rename = "Churn-No")]
    ChurnNo,
}

impl Label {
    /// `1` is churn, anything else is not.
    pub fn from_model_output(value: i64) -> Self { if value == 1 { Label::ChurnYes } else { Label::ChurnNo } }

    pub fn as_str(&self) -> &'static str {
        match self {
            Label::ChurnYes => "Churn-Yes",
            Label::ChurnNo => "Churn-No",
        }
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

/// Work done while the request sits in a phase.
fn stage_name(phase: RequestPhase) -> &'static str {
    match phase {
        RequestPhase::Received => "decode",
        RequestPhase::Decoded => "tabularize",
        RequestPhase::Tabularized => "score",
        RequestPhase::Scored => "label",
        RequestPhase::Rendered | RequestPhase::Failed => "done",
    }
}

/// Decode -> tabularize -> score -> label, one request at a time. Holds no per-request state.
pub struct PredictionService {
    gateway: ModelGateway,
}

impl PredictionService {
    pub fn new(gateway: ModelGateway) -> Self { Self { gateway } }

    pub fn gateway(&self) -> &ModelGateway { &self.gateway }

    #[instrument(skip(self, body), fields(bytes = body.len()))]
    pub async fn predict_submission(&self, body: &[u8], format: SubmissionFormat) -> Result<Label, PredictError> {
        self.predict_decoded(async { form::decode(body, format) }).await
    }

    /// Same pipeline with a caller-supplied decode step, e.g. a streamed multipart body.
    /// Decode time and failures are metered like any other stage.
    pub async fn predict_decoded<F>(&self, decode: F) -> Result<Label, PredictError>
    where
        F: Future<Output = Result<FeatureRecord, PredictError>>,
    {
        let mut lc = RequestLifecycle::new();
        let res = self.run(&mut lc, decode).await;
        match &res {
            Ok(label) => {
                PREDICTION_METRICS.requests_total.with_label_values(&["ok"]).inc();
                info!(%label, elapsed_ms = lc.elapsed().as_secs_f64() * 1000.0, "prediction rendered");
            }
            Err(e) => {
                let failed_in = lc.fail();
                PREDICTION_METRICS.requests_total.with_label_values(&["error"]).inc();
                PREDICTION_METRICS.errors_total.with_label_values(&[e.kind()]).inc();
                warn!(kind = e.kind(), stage = stage_name(failed_in), error = %e, "prediction failed");
            }
        }
        for (phase, d) in lc.durations() {
            PREDICTION_METRICS.stage_latency_ms.with_label_values(&[stage_name(*phase)]).observe(d.as_secs_f64() * 1000.0);
        }
        res
    }

    async fn run<F>(&self, lc: &mut RequestLifecycle, decode: F) -> Result<Label, PredictError>
    where
        F: Future<Output = Result<FeatureRecord, PredictError>>,
    {
        let record = decode.await?;
        debug!(present = record.present_count(), "submission decoded");
        lc.advance();
        let table = TabularRow::from_record(&record);
        lc.advance();
        let value = self.gateway.predict(&table).await?;
        lc.advance();
        let label = Label::from_model_output(value);
        lc.advance();
        Ok(label)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::form::FEATURE_COLUMNS;
    use crate::store::{ArtifactLocation, FsObjectStore};
    use churn_core::ArtifactCachePolicy;
    use std::path::PathBuf;
    use std::sync::Arc;

    const FULL_FORM: &[u8] = b"credit_score=650&France=1&Germany=0&Spain=0&gender=1&age=40&tenure=5&balance=10000&products_number=2&credit_card=1&active_member=1&estimated_salary=50000";

    fn service_with_intercept(tag: &str, intercept: f64) -> (PredictionService, PathBuf) {
        let root = std::env::temp_dir().join(format!("churn-svc-{}-{tag}", std::process::id()));
        std::fs::create_dir_all(root.join("models")).unwrap();
        let artifact = serde_json::json!({
            "feature_names": FEATURE_COLUMNS,
            "estimator": { "kind": "logistic", "coefficients": vec![0.0; 12], "intercept": intercept }
        });
        std::fs::write(root.join("models/model.json"), artifact.to_string()).unwrap();
        let gw = ModelGateway::new(Arc::new(FsObjectStore::new(&root)), ArtifactLocation::new("models", "model.json"), ArtifactCachePolicy::PerInstance);
        (PredictionService::new(gw), root)
    }

    #[test]
    fn label_mapping() {
        assert_eq!(Label::from_model_output(1), Label::ChurnYes);
        assert_eq!(Label::from_model_output(0), Label::ChurnNo);
        assert_eq!(Label::from_model_output(2), Label::ChurnNo);
        assert_eq!(Label::from_model_output(-1), Label::ChurnNo);
        assert_eq!(Label::ChurnYes.to_string(), "Churn-Yes");
        assert_eq!(serde_json::to_string(&Label::ChurnNo).unwrap(), "\"Churn-No\"");
    }

    #[tokio::test]
    async fn model_output_zero_renders_churn_no() {
        let (svc, root) = service_with_intercept("zero", -4.0);
        assert_eq!(svc.predict_submission(FULL_FORM, SubmissionFormat::UrlEncoded).await.unwrap(), Label::ChurnNo);
        std::fs::remove_dir_all(root).unwrap();
    }

    #[tokio::test]
    async fn model_output_one_renders_churn_yes() {
        let (svc, root) = service_with_intercept("one", 4.0);
        assert_eq!(svc.predict_submission(FULL_FORM, SubmissionFormat::UrlEncoded).await.unwrap(), Label::ChurnYes);
        std::fs::remove_dir_all(root).unwrap();
    }

    #[tokio::test]
    async fn missing_keys_return_typed_error() {
        let (svc, root) = service_with_intercept("missing", -4.0);
        let err = svc.predict_submission(b"credit_score=650", SubmissionFormat::UrlEncoded).await.unwrap_err();
        assert_eq!(err.kind(), "schema_mismatch");
        std::fs::remove_dir_all(root).unwrap();
    }

    #[tokio::test]
    async fn external_decode_step_is_metered() {
        let (svc, root) = service_with_intercept("external", -4.0);
        let rec = form::decode(FULL_FORM, SubmissionFormat::UrlEncoded).unwrap();
        assert_eq!(svc.predict_decoded(async { Ok::<_, PredictError>(rec) }).await.unwrap(), Label::ChurnNo);

        let before = PREDICTION_METRICS.errors_total.with_label_values(&["decode"]).get();
        let err = svc.predict_decoded(async { Err::<FeatureRecord, _>(PredictError::Decode("truncated stream".into())) }).await.unwrap_err();
        assert_eq!(err.kind(), "decode");
        assert!(PREDICTION_METRICS.errors_total.with_label_values(&["decode"]).get() > before);
        std::fs::remove_dir_all(root).unwrap();
    }
}
