//! AutoML core library.
//!
//! Training, comparison and replacement of model artifacts on disk, plus
//! prediction with a stored artifact. The model search itself sits behind
//! [`AutoMlEngine`]; [`BaselineEngine`] is the bundled implementation.

pub mod compare;
pub mod digest;
pub mod domain;
pub mod engine;
pub mod lifecycle;
pub mod metrics;
pub mod obs;
pub mod predict;
pub mod store;
pub mod telemetry;
pub mod trainer;

pub use compare::{is_better, DecisionRule};
pub use digest::ArtifactDigest;
pub use domain::{
    metric, AutomlError, ColumnRef, DatasetConfig, Direction, Metrics, ModelArtifact,
    PipelineDescription, Result, TargetColumns, TaskKind, TrainingOutcome, DATASET_CONFIG_FILE,
};
pub use engine::{
    AutoMlEngine, BaselineEngine, Features, FitRequest, FittedModel, Prediction, Table,
};
pub use lifecycle::Lifecycle;
pub use metrics::{MetricsSnapshot, METRICS};
pub use predict::{predict, predict_csv};
pub use store::{
    exists, list_artifacts, load_artifact, load_metrics, recover, save_if_better,
    save_if_better_with, Recovery, ReplacePolicy, METRICS_FILE,
};
pub use telemetry::init_tracing;
pub use trainer::train_model;
