//! Object stores the model artifact can be fetched from.

use async_trait::async_trait;
use std::fmt;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use churn_core::{StoreConfig, StoreKind};

use crate::error::PredictError;

/// (bucket, path) identity of an artifact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactLocation {
    pub bucket: String,
    pub path: String,
}

impl ArtifactLocation {
    pub fn new(bucket: impl Into<String>, path: impl Into<String>) -> Self {
        Self { bucket: bucket.into(), path: path.into() }
    }

    fn key(&self) -> &str { self.path.trim_start_matches('/') }
}

impl fmt::Display for ArtifactLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "s3://{}/{}", self.bucket, self.key()) }
}

#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn fetch(&self, location: &ArtifactLocation) -> Result<Vec<u8>, PredictError>;
}

/// S3-compatible endpoint addressed path-style: `{endpoint}/{bucket}/{path}`.
pub struct HttpObjectStore {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpObjectStore {
    pub fn new(endpoint: &str, timeout: Duration) -> Result<Self, PredictError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| PredictError::artifact(endpoint, e))?;
        Ok(Self { client, endpoint: endpoint.trim_end_matches('/').to_string() })
    }

    pub fn url_for(&self, location: &ArtifactLocation) -> String {
        format!("{}/{}/{}", self.endpoint, location.bucket, location.key())
    }
}

#[async_trait]
impl ObjectStore for HttpObjectStore {
    async fn fetch(&self, location: &ArtifactLocation) -> Result<Vec<u8>, PredictError> {
        let url = self.url_for(location);
        debug!(%url, "fetching artifact over http");
        let resp = self.client.get(&url).send().await.map_err(|e| PredictError::artifact(location, e))?;
        let status = resp.status();
        if !status.is_success() {
            return Err(PredictError::artifact(location, format!("object store answered {status}")));
        }
        let bytes = resp.bytes().await.map_err(|e| PredictError::artifact(location, e))?;
        Ok(bytes.to_vec())
    }
}

/// Local directory laid out as `{root}/{bucket}/{path}`.
pub struct FsObjectStore {
    root: PathBuf,
}

impl FsObjectStore {
    pub fn new(root: impl Into<PathBuf>) -> Self { Self { root: root.into() } }

    pub fn resolve(&self, location: &ArtifactLocation) -> Result<PathBuf, PredictError> {
        let rel = Path::new(&location.bucket).join(location.key());
        if rel.components().any(|c| !matches!(c, Component::Normal(_))) {
            return Err(PredictError::artifact(location, "location escapes the store root"));
        }
        Ok(self.root.join(rel))
    }
}

#[async_trait]
impl ObjectStore for FsObjectStore {
    async fn fetch(&self, location: &ArtifactLocation) -> Result<Vec<u8>, PredictError> {
        let path = self.resolve(location)?;
        debug!(path = %path.display(), "reading artifact from disk");
        tokio::fs::read(&path).await.map_err(|e| PredictError::artifact(location, e))
    }
}

pub fn from_config(cfg: &StoreConfig) -> Result<Arc<dyn ObjectStore>, PredictError> {
    Ok(match cfg.kind {
        StoreKind::Http => Arc::new(HttpObjectStore::new(&cfg.endpoint, Duration::from_secs(cfg.timeout_secs))?),
        StoreKind::Fs => Arc::new(FsObjectStore::new(&cfg.root)),
    })
}
