//! AutoML engine seam.
//!
//! The lifecycle only talks to an engine through [`AutoMlEngine`] and the
//! [`FittedModel`] it returns. [`BaselineEngine`] is the reference
//! implementation shipped with the crate.

pub mod baseline;
pub mod scoring;
pub mod table;

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::domain::{ColumnRef, Metrics, PipelineDescription, Result, TaskKind};

pub use baseline::BaselineEngine;
pub use table::Table;

/// Everything an engine needs to search for and fit a model.
#[derive(Debug, Clone)]
pub struct FitRequest<'a> {
    pub data_path: &'a Path,
    pub task: TaskKind,
    pub target: ColumnRef,
    /// Column holding row identifiers, excluded from features.
    pub index_col: Option<&'a str>,
    pub time_budget: Duration,
    /// Metric the search optimises; see [`TaskKind::target_metric`].
    pub target_metric: &'static str,
}

/// Numeric feature matrix produced by [`FittedModel::prepare`].
#[derive(Debug, Clone, PartialEq)]
pub struct Features {
    pub rows: Vec<Vec<f64>>,
}

impl Features {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// A single prediction: a class label or a numeric value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Prediction {
    Value(f64),
    Label(String),
}

/// A model search engine.
pub trait AutoMlEngine: Send + Sync {
    /// Search for and fit a model. The returned model keeps the held-out
    /// partition so that [`FittedModel::get_metrics`] can evaluate it.
    fn fit(&self, request: &FitRequest<'_>) -> Result<Box<dyn FittedModel>>;

    /// Load a previously saved model from `dir`.
    fn load(&self, task: TaskKind, dir: &Path) -> Result<Box<dyn FittedModel>>;
}

/// A fitted model produced by an [`AutoMlEngine`].
pub trait FittedModel: Send {
    fn describe(&self) -> PipelineDescription;

    /// Evaluate the named metrics on the held-out partition.
    fn get_metrics(&self, names: &[&str]) -> Result<Metrics>;

    /// Turn raw rows into model input, applying the preprocessing learned at fit time.
    fn prepare(&self, data: &Table) -> Result<Features>;

    fn predict(&self, features: &Features) -> Result<Vec<Prediction>>;

    /// Write the model into `dir`, which already exists and is empty.
    fn save(&self, dir: &Path) -> Result<()>;
}
