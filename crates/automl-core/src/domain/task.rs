//! Prediction task kinds and the metric sets attached to each.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::error::AutomlError;

/// Metric names understood by the lifecycle.
pub mod metric {
    pub const ROC_AUC: &str = "roc_auc";
    pub const F1: &str = "f1";
    pub const ACCURACY: &str = "accuracy";
    pub const MSE: &str = "mse";
    pub const MAE: &str = "mae";
    pub const MAPE: &str = "mape";
    pub const RMSE: &str = "rmse";
    pub const R2: &str = "r2";
}

/// Direction in which a metric improves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    HigherIsBetter,
    LowerIsBetter,
}

impl Direction {
    /// Improvement direction of a named metric. Error measures shrink, scores grow.
    pub fn of(metric_name: &str) -> Direction {
        match metric_name {
            metric::MSE | metric::MAE | metric::MAPE | metric::RMSE => Direction::LowerIsBetter,
            _ => Direction::HigherIsBetter,
        }
    }

    /// Strict improvement test. A NaN candidate never improves; any other
    /// candidate improves on a NaN baseline.
    pub fn improves(self, candidate: f64, baseline: f64) -> bool {
        if candidate.is_nan() {
            return false;
        }
        if baseline.is_nan() {
            return true;
        }
        match self {
            Direction::HigherIsBetter => candidate > baseline,
            Direction::LowerIsBetter => candidate < baseline,
        }
    }
}

/// Kind of prediction task a dataset is trained for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskKind {
    Classification,
    Regression,
}

impl TaskKind {
    pub const ALL: [TaskKind; 2] = [TaskKind::Classification, TaskKind::Regression];

    pub fn as_str(self) -> &'static str {
        match self {
            TaskKind::Classification => "classification",
            TaskKind::Regression => "regression",
        }
    }

    /// Metric optimised by the model search.
    pub fn target_metric(self) -> &'static str {
        match self {
            TaskKind::Classification => metric::ROC_AUC,
            TaskKind::Regression => metric::MAPE,
        }
    }

    /// Metric that decides whether a new artifact supersedes a stored one.
    pub fn decision_metric(self) -> (&'static str, Direction) {
        match self {
            TaskKind::Classification => (metric::ROC_AUC, Direction::HigherIsBetter),
            TaskKind::Regression => (metric::MSE, Direction::LowerIsBetter),
        }
    }

    /// Metrics reported after training, evaluated on the held-out partition.
    pub fn reported_metrics(self) -> &'static [&'static str] {
        match self {
            TaskKind::Classification => &[metric::ROC_AUC, metric::F1, metric::ACCURACY],
            TaskKind::Regression => &[
                metric::MSE,
                metric::MAE,
                metric::MAPE,
                metric::RMSE,
                metric::R2,
            ],
        }
    }

    /// Whether rows may be shuffled before the train/test split.
    ///
    /// Both current kinds are order-free; a time-series kind would return `false`.
    pub fn shuffle_split(self) -> bool {
        match self {
            TaskKind::Classification | TaskKind::Regression => true,
        }
    }

    fn supported() -> Vec<&'static str> {
        Self::ALL.iter().map(|k| k.as_str()).collect()
    }
}

impl fmt::Display for TaskKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskKind {
    type Err = AutomlError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TaskKind::ALL
            .into_iter()
            .find(|k| k.as_str() == s)
            .ok_or_else(|| AutomlError::InvalidTaskKind {
                got: s.to_string(),
                supported: Self::supported(),
            })
    }
}
