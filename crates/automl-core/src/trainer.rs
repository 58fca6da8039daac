//! Trainer adapter: validates the request, hands the search to the engine and
//! collects the reported metrics for the task kind.

use std::path::Path;
use std::time::Duration;

use crate::domain::{AutomlError, Metrics, Result, TargetColumns, TaskKind};
use crate::engine::{AutoMlEngine, FitRequest, FittedModel};

/// Fit a model and evaluate it on the held-out partition.
///
/// `task` is validated before the engine is touched. Engine failures are
/// returned as they are, without retry.
pub fn train_model(
    engine: &dyn AutoMlEngine,
    data_path: &Path,
    task: &str,
    target_columns: &TargetColumns,
    index_col: Option<&str>,
    time_budget_minutes: f64,
) -> Result<(Box<dyn FittedModel>, Metrics)> {
    let task: TaskKind = task.parse()?;
    if !(time_budget_minutes.is_finite() && time_budget_minutes > 0.0) {
        return Err(AutomlError::InvalidTimeBudget(time_budget_minutes));
    }
    let target = target_columns.primary().ok_or_else(|| {
        AutomlError::InvalidDatasetConfig("target_columns is empty".to_string())
    })?;

    let request = FitRequest {
        data_path,
        task,
        target,
        index_col,
        time_budget: Duration::from_secs_f64(time_budget_minutes * 60.0),
        target_metric: task.target_metric(),
    };
    let model = engine.fit(&request)?;
    let metrics = model.get_metrics(task.reported_metrics())?;
    Ok((model, metrics))
}
