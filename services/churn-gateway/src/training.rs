//! On-demand training trigger. The pipeline itself runs outside this process.

use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use std::sync::Arc;
use tokio::process::Command;
use tracing::{info, warn};

use churn_core::{TrainingConfig, PREDICTION_METRICS};

pub const SUCCESS_MESSAGE: &str = "Training successful!!!";

#[async_trait]
pub trait TrainingPipeline: Send + Sync {
    async fn run(&self) -> Result<()>;
}

/// Runs the configured program to completion. Non-zero exit is a failure carrying the stderr tail.
pub struct CommandPipeline {
    program: String,
    args: Vec<String>,
    workdir: Option<String>,
}

impl CommandPipeline {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self { program: program.into(), args, workdir: None }
    }

    pub fn in_dir(mut self, dir: Option<String>) -> Self { self.workdir = dir; self }
}

#[async_trait]
impl TrainingPipeline for CommandPipeline {
    async fn run(&self) -> Result<()> {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args);
        if let Some(dir) = &self.workdir { cmd.current_dir(dir); }
        info!(program = %self.program, args = ?self.args, "starting training pipeline");
        let out = cmd.output().await.map_err(|e| anyhow!("could not start `{}`: {e}", self.program))?;
        if !out.status.success() {
            bail!("training pipeline exited with {}: {}", out.status, stderr_tail(&out.stderr, 5));
        }
        Ok(())
    }
}

struct UnconfiguredPipeline;

#[async_trait]
impl TrainingPipeline for UnconfiguredPipeline {
    async fn run(&self) -> Result<()> { bail!("training pipeline not configured") }
}

pub fn pipeline_from_config(cfg: &TrainingConfig) -> Arc<dyn TrainingPipeline> {
    match &cfg.program {
        Some(program) if !program.trim().is_empty() => {
            Arc::new(CommandPipeline::new(program.clone(), cfg.args.clone()).in_dir(cfg.workdir.clone()))
        }
        _ => Arc::new(UnconfiguredPipeline),
    }
}

fn stderr_tail(stderr: &[u8], lines: usize) -> String {
    let text = String::from_utf8_lossy(stderr);
    let all: Vec<&str> = text.lines().filter(|l| !l.trim().is_empty()).collect();
    all[all.len().saturating_sub(lines)..].join(" | ")
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TrainOutcome { Succeeded, Failed(String) }

impl TrainOutcome {
    /// Response body text for the train route.
    pub fn message(&self) -> String {
        match self {
            TrainOutcome::Succeeded => SUCCESS_MESSAGE.to_string(),
            TrainOutcome::Failed(e) => format!("Error Occurred! {e}"),
        }
    }
}

#[derive(Clone)]
pub struct TrainingTrigger {
    pipeline: Arc<dyn TrainingPipeline>,
}

impl TrainingTrigger {
    pub fn new(pipeline: Arc<dyn TrainingPipeline>) -> Self { Self { pipeline } }

    /// Runs the pipeline to completion. Never returns an error; failure is part of the outcome.
    /// The run happens on its own task and finishes even if the caller stops waiting.
    pub async fn trigger(&self) -> TrainOutcome {
        let pipeline = Arc::clone(&self.pipeline);
        let run = tokio::spawn(async move {
            let outcome = match pipeline.run().await {
                Ok(()) => TrainOutcome::Succeeded,
                Err(e) => TrainOutcome::Failed(e.to_string()),
            };
            record(&outcome);
            outcome
        });
        run.await.unwrap_or_else(|e| {
            let outcome = TrainOutcome::Failed(format!("training task aborted: {e}"));
            record(&outcome);
            outcome
        })
    }
}

fn record(outcome: &TrainOutcome) {
    match outcome {
        TrainOutcome::Succeeded => {
            PREDICTION_METRICS.training_runs_total.with_label_values(&["ok"]).inc();
            info!("training pipeline finished");
        }
        TrainOutcome::Failed(e) => {
            PREDICTION_METRICS.training_runs_total.with_label_values(&["error"]).inc();
            warn!(error = %e, "training pipeline failed");
        }
    }
}
