//! Lifecycle orchestrator: train, then save only if the policy allows it.

use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use crate::compare::DecisionRule;
use crate::domain::{DatasetConfig, Result, TrainingOutcome};
use crate::engine::AutoMlEngine;
use crate::metrics::METRICS;
use crate::obs::{self, TaskSpan};
use crate::store::{self, ReplacePolicy};
use crate::trainer;

/// Runs training cycles against one engine.
///
/// Blocks for the whole training budget. Async callers should run it on a
/// blocking worker and serialise cycles that share a save directory.
#[derive(Clone)]
pub struct Lifecycle {
    engine: Arc<dyn AutoMlEngine>,
}

impl Lifecycle {
    pub fn new(engine: Arc<dyn AutoMlEngine>) -> Self {
        Self { engine }
    }

    pub fn engine(&self) -> &dyn AutoMlEngine {
        self.engine.as_ref()
    }

    /// Train on the dataset described by `config` (paths relative to
    /// `dataset_root`) and offer the result to the artifact at `save_dir`.
    ///
    /// Either a full outcome is returned or an error; nothing in between.
    pub fn run_training_cycle(
        &self,
        dataset_root: &Path,
        config: &DatasetConfig,
        save_dir: &Path,
        time_budget_minutes: f64,
        policy: ReplacePolicy,
    ) -> Result<TrainingOutcome> {
        let task_id = obs::new_task_id();
        let _span = TaskSpan::enter(&task_id);

        let task = config.task_kind()?;
        let data_path = config.data_path(dataset_root);
        obs::emit_train_started(task, &data_path, time_budget_minutes);
        METRICS.inc_trainings();

        let started = Instant::now();
        let (model, metrics) = trainer::train_model(
            self.engine(),
            &data_path,
            &config.task,
            &config.target_columns,
            config.index_col.as_deref(),
            time_budget_minutes,
        )?;
        let pipeline = model.describe();
        obs::emit_train_finished(&pipeline.nodes, &metrics, started.elapsed().as_millis() as u64);

        let saved = store::save_if_better_with(
            save_dir,
            model.as_ref(),
            &metrics,
            policy,
            DecisionRule::ForTask(task),
        )?;

        Ok(TrainingOutcome {
            pipeline,
            metrics,
            saved,
        })
    }

    /// [`Lifecycle::run_training_cycle`] reading `config.yaml` from `dataset_root`.
    pub fn train_dataset(
        &self,
        dataset_root: &Path,
        save_dir: &Path,
        time_budget_minutes: f64,
        policy: ReplacePolicy,
    ) -> Result<TrainingOutcome> {
        let config = DatasetConfig::load(dataset_root)?;
        self.run_training_cycle(dataset_root, &config, save_dir, time_budget_minutes, policy)
    }
}

impl std::fmt::Debug for Lifecycle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Lifecycle").finish_non_exhaustive()
    }
}
