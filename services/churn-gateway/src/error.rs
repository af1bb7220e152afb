use thiserror::Error;

/// Every way a prediction request can fail. Each kind has a stable name used in payloads and metrics.
#[derive(Debug, Error)]
pub enum PredictError {
    #[error("could not decode submission: {0}")]
    Decode(String),
    #[error("schema mismatch: {0}")]
    SchemaMismatch(String),
    #[error("could not load model artifact {location}: {reason}")]
    ArtifactFetch { location: String, reason: String },
    #[error("inference failed: {0}")]
    Inference(String),
}

impl PredictError {
    pub fn kind(&self) -> &'static str {
        match self {
            PredictError::Decode(_) => "decode",
            PredictError::SchemaMismatch(_) => "schema_mismatch",
            PredictError::ArtifactFetch { .. } => "artifact_fetch",
            PredictError::Inference(_) => "inference",
        }
    }

    pub(crate) fn artifact(location: impl std::fmt::Display, reason: impl std::fmt::Display) -> Self {
        PredictError::ArtifactFetch { location: location.to_string(), reason: reason.to_string() }
    }
}
