use churn_core::{load_config, ArtifactCachePolicy, StoreKind};

// Single test: env vars are process-wide.
#[test]
fn file_then_env_layering() {
    let dir = std::env::temp_dir().join(format!("churn-cfg-{}", std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();
    let file = dir.join("churn.yaml");
    std::fs::write(&file, "app_port: 7000\nmodel:\n  bucket_name: from-file\n  store:\n    kind: fs\n").unwrap();

    std::env::set_var("CHURN_CONFIG_FILE", &file);
    std::env::set_var("CHURN__APP_PORT", "7100");
    std::env::set_var("CHURN__MODEL__CACHE_POLICY", "per_call");
    std::env::set_var("CHURN__TRAINING__PROGRAM", "python");
    std::env::set_var("CHURN__TRAINING__ARGS", "train.py,--upload");

    let cfg = load_config("churn-gateway").unwrap();
    assert_eq!(cfg.service_name, "churn-gateway");
    assert_eq!(cfg.app_port, 7100);
    assert_eq!(cfg.model.bucket_name, "from-file");
    assert_eq!(cfg.model.store.kind, StoreKind::Fs);
    assert_eq!(cfg.model.cache_policy, ArtifactCachePolicy::PerCall);
    assert_eq!(cfg.training.program.as_deref(), Some("python"));
    assert_eq!(cfg.training.args, vec!["train.py".to_string(), "--upload".to_string()]);

    for key in ["CHURN_CONFIG_FILE", "CHURN__APP_PORT", "CHURN__MODEL__CACHE_POLICY", "CHURN__TRAINING__PROGRAM", "CHURN__TRAINING__ARGS"] {
        std::env::remove_var(key);
    }
    std::fs::remove_dir_all(&dir).unwrap();
}
