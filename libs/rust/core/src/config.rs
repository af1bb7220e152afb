//! Layered service configuration: defaults, optional file (`CHURN_CONFIG_FILE`), then `CHURN__*` env vars.

use anyhow::Result;
use config::builder::DefaultState;
use config::{ConfigBuilder, FileFormat};
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub service_name: String,
    pub app_host: String,
    pub app_port: u16,
    pub static_dir: String,
    pub model: ModelConfig,
    pub training: TrainingConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ModelConfig {
    pub bucket_name: String,
    pub file_path: String,
    pub cache_policy: ArtifactCachePolicy,
    pub expected_sha256: Option<String>,
    pub store: StoreConfig,
}

/// When the gateway goes back to the object store for the artifact.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactCachePolicy {
    /// Fetch on first use, keep for the lifetime of the gateway. Failed fetches are not cached.
    #[default]
    PerInstance,
    /// Fetch and deserialize on every prediction.
    PerCall,
}

#[derive(Debug, Deserialize, Clone)]
pub struct StoreConfig {
    pub kind: StoreKind,
    pub endpoint: String,
    pub root: String,
    pub timeout_secs: u64,
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum StoreKind { Http, Fs }

#[derive(Debug, Deserialize, Clone, Default)]
pub struct TrainingConfig {
    pub program: Option<String>,
    #[serde(default)]
    pub args: Vec<String>,
    pub workdir: Option<String>,
}

impl AppConfig {
    pub fn bind_address(&self) -> String { format!("{}:{}", self.app_host, self.app_port) }

    /// Defaults overlaid with an in-memory document, no env lookup. Used by tests and tooling.
    pub fn from_document(text: &str, format: FileFormat) -> Result<Self> {
        let cfg = defaults("churn-gateway")?.add_source(config::File::from_str(text, format)).build()?;
        Ok(cfg.try_deserialize()?)
    }
}

fn defaults(service: &str) -> Result<ConfigBuilder<DefaultState>> {
    Ok(config::Config::builder()
        .set_default("service_name", service)?
        .set_default("app_host", "0.0.0.0")?
        .set_default("app_port", 5000)?
        .set_default("static_dir", "static")?
        .set_default("model.bucket_name", "churn-model-store")?
        .set_default("model.file_path", "model.json")?
        .set_default("model.cache_policy", "per_instance")?
        .set_default("model.store.kind", "http")?
        .set_default("model.store.endpoint", "http://127.0.0.1:9000")?
        .set_default("model.store.root", "artifacts")?
        .set_default("model.store.timeout_secs", 30)?
        .set_default("training.args", Vec::<String>::new())?)
}

pub fn load_config(service: &str) -> Result<AppConfig> {
    let mut builder = defaults(service)?;
    if let Ok(file) = std::env::var("CHURN_CONFIG_FILE") {
        builder = builder.add_source(config::File::with_name(&file).required(false));
    }
    builder = builder.add_source(
        config::Environment::with_prefix("CHURN")
            .separator("__")
            .try_parsing(true)
            .list_separator(",")
            .with_list_parse_key("training.args"),
    );
    let cfg: AppConfig = builder.build()?.try_deserialize()?;
    tracing::debug!(?cfg, "configuration resolved");
    Ok(cfg)
}
