//! Prometheus metric groups for the prediction path and the training trigger.
//!
//! Everything registers into one process-wide registry served on `/metrics`.

use once_cell::sync::Lazy;
use prometheus::{HistogramOpts, HistogramVec, IntCounterVec, Opts, Registry};

pub struct PredictionMetrics {
    /// label: outcome (`ok` | `error`)
    pub requests_total: IntCounterVec,
    /// label: kind (`decode` | `schema_mismatch` | `artifact_fetch` | `inference`)
    pub errors_total: IntCounterVec,
    /// label: stage
    pub stage_latency_ms: HistogramVec,
    /// label: result (`ok` | `error`)
    pub artifact_fetch_total: IntCounterVec,
    /// label: outcome (`ok` | `error`)
    pub training_runs_total: IntCounterVec,
}

static REGISTRY: Lazy<Registry> = Lazy::new(Registry::new);

pub fn registry() -> &'static Registry { &REGISTRY }

fn counter(name: &str, help: &str, label: &str) -> IntCounterVec {
    let c = IntCounterVec::new(Opts::new(name, help), &[label]).expect("static counter definition");
    REGISTRY.register(Box::new(c.clone())).expect("counter registered once");
    c
}

pub static PREDICTION_METRICS: Lazy<PredictionMetrics> = Lazy::new(|| {
    let stage_latency_ms = HistogramVec::new(
        HistogramOpts::new("churn_prediction_stage_latency_ms", "Latency per prediction stage (ms)")
            .buckets(vec![0.05, 0.1, 0.5, 1.0, 5.0, 10.0, 50.0, 100.0, 500.0, 1000.0, 5000.0]),
        &["stage"],
    ).expect("static histogram definition");
    REGISTRY.register(Box::new(stage_latency_ms.clone())).expect("histogram registered once");
    PredictionMetrics {
        requests_total: counter("churn_prediction_requests_total", "Prediction requests by outcome", "outcome"),
        errors_total: counter("churn_prediction_errors_total", "Prediction failures by error kind", "kind"),
        stage_latency_ms,
        artifact_fetch_total: counter("churn_artifact_fetch_total", "Model artifact fetches by result", "result"),
        training_runs_total: counter("churn_training_runs_total", "Training pipeline runs by outcome", "outcome"),
    }
});

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn families_are_registered() {
        PREDICTION_METRICS.errors_total.with_label_values(&["decode"]).inc();
        PREDICTION_METRICS.stage_latency_ms.with_label_values(&["decode"]).observe(0.2);
        let names: Vec<String> = registry().gather().iter().map(|f| f.get_name().to_string()).collect();
        assert!(names.iter().any(|n| n == "churn_prediction_errors_total"));
        assert!(names.iter().any(|n| n == "churn_prediction_stage_latency_ms"));
    }
}
