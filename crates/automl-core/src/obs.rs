//! Structured lifecycle events.
//!
//! Every event is an `info!` (or `warn!`) record with an `event` field, so a
//! JSON log pipeline can filter on it:
//!
//! - `train.started` / `train.finished`
//! - `artifact.kept` / `artifact.replaced` / `artifact.rollback`
//! - `artifact.cleanup_failed`
//! - `predict.finished`

use std::path::Path;

use tracing::{info, warn};

use crate::domain::{Metrics, TaskKind};

/// RAII guard entering a span tagged with a training task id.
pub struct TaskSpan {
    _span: tracing::span::EnteredSpan,
}

impl TaskSpan {
    pub fn enter(task_id: &str) -> Self {
        let span = tracing::info_span!("automl.train", task_id = %task_id);
        Self {
            _span: span.entered(),
        }
    }
}

/// Short id used to correlate the log lines of one training cycle.
pub fn new_task_id() -> String {
    uuid::Uuid::new_v4().simple().to_string()[..8].to_string()
}

pub fn emit_train_started(task: TaskKind, data_path: &Path, time_budget_minutes: f64) {
    info!(
        event = "train.started",
        task = %task,
        data_path = %data_path.display(),
        time_budget_minutes = time_budget_minutes,
    );
}

pub fn emit_train_finished(pipeline: &[String], metrics: &Metrics, duration_ms: u64) {
    info!(
        event = "train.finished",
        pipeline = ?pipeline,
        metrics = ?metrics,
        duration_ms = duration_ms,
    );
}

/// The stored artifact stays; the candidate is discarded.
pub fn emit_artifact_kept(dir: &Path, candidate: &Metrics, baseline: &Metrics) {
    info!(
        event = "artifact.kept",
        dir = %dir.display(),
        candidate = ?candidate,
        baseline = ?baseline,
    );
}

pub fn emit_artifact_replaced(dir: &Path, had_previous: bool) {
    info!(
        event = "artifact.replaced",
        dir = %dir.display(),
        had_previous = had_previous,
    );
}

pub fn emit_artifact_rollback(dir: &Path, error: &dyn std::fmt::Display) {
    warn!(event = "artifact.rollback", dir = %dir.display(), error = %error);
}

pub fn emit_cleanup_failed(holder: &Path, error: &dyn std::fmt::Display) {
    warn!(
        event = "artifact.cleanup_failed",
        holder = %holder.display(),
        error = %error,
    );
}

pub fn emit_predict_finished(dir: &Path, rows: usize, duration_ms: u64) {
    info!(
        event = "predict.finished",
        dir = %dir.display(),
        rows = rows,
        duration_ms = duration_ms,
    );
}
