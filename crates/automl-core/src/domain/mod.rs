//! Domain models for the AutoML lifecycle.
//!
//! Canonical definitions for the core entities:
//! - `TaskKind`: what a dataset is trained for, and its metric sets
//! - `DatasetConfig`: how a dataset is laid out on disk
//! - `TrainingOutcome` / `ModelArtifact`: what a training cycle produces

pub mod dataset_config;
pub mod error;
pub mod outcome;
pub mod task;

pub use dataset_config::{ColumnRef, DatasetConfig, TargetColumns, DATASET_CONFIG_FILE};
pub use error::{AutomlError, Result};
pub use outcome::{Metrics, ModelArtifact, PipelineDescription, TrainingOutcome};
pub use task::{metric, Direction, TaskKind};
