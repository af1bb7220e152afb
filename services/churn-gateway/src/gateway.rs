use sha2::{Digest, Sha256};
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};

use churn_core::{ArtifactCachePolicy, ModelConfig, PREDICTION_METRICS};

use crate::error::PredictError;
use crate::model::ModelArtifact;
use crate::store::{self, ArtifactLocation, ObjectStore};
use crate::table::TabularRow;

/// Resolves the model artifact from the object store and scores tabular rows with it.
pub struct ModelGateway {
    store: Arc<dyn ObjectStore>,
    location: ArtifactLocation,
    policy: ArtifactCachePolicy,
    expected_sha256: Option<String>,
    cached: OnceCell<Arc<ModelArtifact>>,
}

impl ModelGateway {
    pub fn new(store: Arc<dyn ObjectStore>, location: ArtifactLocation, policy: ArtifactCachePolicy) -> Self {
        Self { store, location, policy, expected_sha256: None, cached: OnceCell::new() }
    }

    pub fn with_expected_sha256(mut self, digest: Option<String>) -> Self {
        self.expected_sha256 = digest.filter(|d| !d.is_empty());
        self
    }

    pub fn from_config(cfg: &ModelConfig) -> Result<Self, PredictError> {
        let store = store::from_config(&cfg.store)?;
        let location = ArtifactLocation::new(&cfg.bucket_name, &cfg.file_path);
        Ok(Self::new(store, location, cfg.cache_policy).with_expected_sha256(cfg.expected_sha256.clone()))
    }

    pub fn location(&self) -> &ArtifactLocation { &self.location }

    pub fn policy(&self) -> ArtifactCachePolicy { self.policy }

    /// The artifact to score with, honouring the cache policy.
    pub async fn artifact(&self) -> Result<Arc<ModelArtifact>, PredictError> {
        match self.policy {
            ArtifactCachePolicy::PerCall => self.load().await,
            ArtifactCachePolicy::PerInstance => self.cached.get_or_try_init(|| self.load()).await.cloned(),
        }
    }

    async fn load(&self) -> Result<Arc<ModelArtifact>, PredictError> {
        let res = self.fetch_and_parse().await;
        let result = if res.is_ok() { "ok" } else { "error" };
        PREDICTION_METRICS.artifact_fetch_total.with_label_values(&[result]).inc();
        match &res {
            Ok(a) => info!(location = %self.location, features = a.n_features(), "model artifact loaded"),
            Err(e) => warn!(location = %self.location, error = %e, "model artifact load failed"),
        }
        res
    }

    async fn fetch_and_parse(&self) -> Result<Arc<ModelArtifact>, PredictError> {
        let bytes = self.store.fetch(&self.location).await?;
        if let Some(expect) = &self.expected_sha256 {
            let got = hex::encode(Sha256::digest(&bytes));
            if !expect.eq_ignore_ascii_case(&got) {
                return Err(PredictError::artifact(&self.location, format!("sha256 mismatch expected={expect} got={got}")));
            }
        }
        let artifact = ModelArtifact::from_slice(&bytes).map_err(|e| PredictError::artifact(&self.location, e))?;
        Ok(Arc::new(artifact))
    }

    /// Scores the row and returns the first element of the model output.
    pub async fn predict(&self, table: &TabularRow) -> Result<i64, PredictError> {
        let artifact = self.artifact().await?;
        artifact.check_schema(&table.column_names())?;
        let matrix = table.to_matrix()?;
        let output = artifact.predict(&matrix)?;
        debug!(?output, "model output");
        output.first().copied().ok_or_else(|| PredictError::Inference("model returned no output".into()))
    }
}
