//! Reference engine: a small, time-boxed model search over a fixed
//! candidate list, scored by k-fold cross validation on the training
//! partition.
//!
//! Pipelines are always `imputation -> scaling -> <estimator>`. The fitted
//! pipeline is persisted as `pipeline.json`.

mod estimators;
mod prep;

use std::fmt::Debug;
use std::path::Path;
use std::time::Instant;

use serde::{Deserialize, Serialize};

use crate::domain::{AutomlError, Direction, Metrics, PipelineDescription, Result, TaskKind};
use crate::engine::scoring::{argmax, ClassificationEval, RegressionEval};
use crate::engine::{AutoMlEngine, Features, FitRequest, FittedModel, Prediction, Table};

use estimators::{Classifier, ClassifierSpec, Regressor, RegressorSpec};
use prep::{select_rows, train_test_split, Preprocessor, Targets, TrainingData};

/// File holding a saved baseline pipeline inside an artifact directory.
pub const PIPELINE_FILE: &str = "pipeline.json";

const PIPELINE_FORMAT_VERSION: u32 = 2;

/// Reference [`AutoMlEngine`].
#[derive(Debug, Clone)]
pub struct BaselineEngine {
    seed: u64,
    folds: usize,
}

impl Default for BaselineEngine {
    fn default() -> Self {
        Self { seed: 42, folds: 3 }
    }
}

impl BaselineEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed for the train/test shuffle.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Evaluate candidates in order until the budget runs out and return the
    /// best one. The first candidate is always evaluated. A candidate that
    /// fails to fit or score is skipped; if none succeeds the last failure is
    /// returned.
    fn search<S, F>(
        &self,
        specs: &[S],
        n_train: usize,
        metric: &str,
        deadline: Instant,
        mut evaluate: F,
    ) -> Result<S>
    where
        S: Copy + Debug,
        F: FnMut(S, &[usize], &[usize]) -> Result<f64>,
    {
        let direction = Direction::of(metric);
        let folds = cross_val_folds(n_train, self.folds);
        let mut best: Option<(S, f64)> = None;
        let mut last_error = None;

        for (i, &spec) in specs.iter().enumerate() {
            if i > 0 && Instant::now() >= deadline {
                tracing::debug!(evaluated = i, "time budget exhausted, stopping search");
                break;
            }
            let score = match folds
                .iter()
                .map(|(train, valid)| evaluate(spec, train, valid))
                .sum::<Result<f64>>()
            {
                Ok(total) => total / folds.len() as f64,
                Err(e) => {
                    tracing::warn!(candidate = ?spec, error = %e, "candidate skipped");
                    last_error = Some(e);
                    continue;
                }
            };
            tracing::debug!(candidate = ?spec, metric, score, "candidate scored");

            match best {
                Some((_, best_score)) if !direction.improves(score, best_score) => {}
                _ => best = Some((spec, score)),
            }
        }

        match (best, last_error) {
            (Some((spec, _)), _) => Ok(spec),
            (None, Some(e)) => Err(e),
            (None, None) => Err(AutomlError::Training(
                "no candidate models to evaluate".to_string(),
            )),
        }
    }
}

/// Fold index sets over `0..n`. With fewer than two rows per fold the whole
/// set is used for both fitting and scoring.
fn cross_val_folds(n: usize, k: usize) -> Vec<(Vec<usize>, Vec<usize>)> {
    let k = k.min(n / 2);
    if k < 2 {
        let all: Vec<usize> = (0..n).collect();
        return vec![(all.clone(), all)];
    }
    (0..k)
        .map(|f| (0..n).partition::<Vec<usize>, _>(|i| i % k != f))
        .collect()
}

impl AutoMlEngine for BaselineEngine {
    fn fit(&self, request: &FitRequest<'_>) -> Result<Box<dyn FittedModel>> {
        let deadline = Instant::now() + request.time_budget;
        let table = Table::from_csv_path(request.data_path).map_err(|e| match e {
            AutomlError::Io(io) => AutomlError::DataPreparationFailed(format!(
                "cannot read {:?}: {io}",
                request.data_path
            )),
            other => other,
        })?;

        let data =
            TrainingData::from_table(&table, request.task, &request.target, request.index_col)?;
        if data.len() < 2 {
            return Err(AutomlError::DataPreparationFailed(format!(
                "need at least 2 rows to train, got {}",
                data.len()
            )));
        }

        let (train_idx, test_idx) =
            train_test_split(data.len(), request.task.shuffle_split(), self.seed);
        let preprocessor =
            Preprocessor::fit(data.feature_names.clone(), &select_rows(&data.x, &train_idx));
        let transform = |idx: &[usize]| -> Vec<Vec<f64>> {
            idx.iter().map(|&i| preprocessor.transform(&data.x[i])).collect()
        };
        let x_train = transform(&train_idx);
        let x_test = transform(&test_idx);

        let (estimator, holdout_y) = match (request.task, data.targets.select(&train_idx)) {
            (TaskKind::Classification, Targets::Classes(y_train)) => {
                let n_classes = data.classes.len();
                let spec = self.search(
                    &ClassifierSpec::SEARCH_ORDER,
                    x_train.len(),
                    request.target_metric,
                    deadline,
                    |spec: ClassifierSpec, tr: &[usize], va: &[usize]| {
                        let model =
                            spec.fit(&select_rows(&x_train, tr), &pick(&y_train, tr), n_classes)?;
                        let truth = pick(&y_train, va);
                        let proba = model.predict_proba(&select_rows(&x_train, va))?;
                        ClassificationEval {
                            truth: &truth,
                            proba: &proba,
                            n_classes,
                        }
                        .score(request.target_metric)
                    },
                )?;
                (
                    Estimator::Classifier(spec.fit(&x_train, &y_train, n_classes)?),
                    data.targets.select(&test_idx),
                )
            }
            (TaskKind::Regression, Targets::Values(y_train)) => {
                let spec = self.search(
                    &RegressorSpec::SEARCH_ORDER,
                    x_train.len(),
                    request.target_metric,
                    deadline,
                    |spec: RegressorSpec, tr: &[usize], va: &[usize]| {
                        let model = spec.fit(&select_rows(&x_train, tr), &pick(&y_train, tr))?;
                        let truth = pick(&y_train, va);
                        let predicted = model.predict(&select_rows(&x_train, va))?;
                        RegressionEval {
                            truth: &truth,
                            predicted: &predicted,
                        }
                        .score(request.target_metric)
                    },
                )?;
                (
                    Estimator::Regressor(spec.fit(&x_train, &y_train)?),
                    data.targets.select(&test_idx),
                )
            }
            (task, _) => {
                return Err(AutomlError::Training(format!(
                    "target encoding does not match task '{task}'"
                )))
            }
        };

        let model = BaselineModel {
            pipeline: StoredPipeline {
                format_version: PIPELINE_FORMAT_VERSION,
                task: request.task,
                target: data.target_name,
                classes: data.classes,
                preprocessor,
                estimator,
            },
            holdout: Some((x_test, holdout_y)),
        };
        tracing::debug!(pipeline = ?model.describe().nodes, "baseline search finished");
        Ok(Box::new(model))
    }

    fn load(&self, task: TaskKind, dir: &Path) -> Result<Box<dyn FittedModel>> {
        let path = dir.join(PIPELINE_FILE);
        let bytes = std::fs::read(&path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                AutomlError::ArtifactNotFound(dir.to_path_buf())
            } else {
                AutomlError::Io(e)
            }
        })?;
        let pipeline: StoredPipeline = serde_json::from_slice(&bytes)?;
        if pipeline.format_version != PIPELINE_FORMAT_VERSION {
            return Err(AutomlError::Training(format!(
                "unsupported pipeline format version {} in {:?}",
                pipeline.format_version, path
            )));
        }
        if pipeline.task != task {
            return Err(AutomlError::Training(format!(
                "model at {:?} was trained for '{}', not '{}'",
                dir, pipeline.task, task
            )));
        }
        Ok(Box::new(BaselineModel {
            pipeline,
            holdout: None,
        }))
    }
}

fn pick<T: Copy>(values: &[T], idx: &[usize]) -> Vec<T> {
    idx.iter().map(|&i| values[i]).collect()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
enum Estimator {
    Classifier(Classifier),
    Regressor(Regressor),
}

impl Estimator {
    fn name(&self) -> String {
        match self {
            Estimator::Classifier(c) => c.name(),
            Estimator::Regressor(r) => r.name(),
        }
    }
}

/// On-disk form of a fitted baseline pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoredPipeline {
    format_version: u32,
    task: TaskKind,
    target: String,
    /// Class labels in index order; empty for regression.
    #[serde(default)]
    classes: Vec<String>,
    preprocessor: Preprocessor,
    estimator: Estimator,
}

struct BaselineModel {
    pipeline: StoredPipeline,
    /// Transformed test features and their targets; absent after `load`.
    holdout: Option<(Vec<Vec<f64>>, Targets)>,
}

impl FittedModel for BaselineModel {
    fn describe(&self) -> PipelineDescription {
        PipelineDescription::chain(vec![
            "imputation".to_string(),
            "scaling".to_string(),
            self.pipeline.estimator.name(),
        ])
    }

    fn get_metrics(&self, names: &[&str]) -> Result<Metrics> {
        let (x, y) = self.holdout.as_ref().ok_or_else(|| {
            AutomlError::Training("loaded model has no held-out data to evaluate".to_string())
        })?;
        match (&self.pipeline.estimator, y) {
            (Estimator::Classifier(clf), Targets::Classes(truth)) => ClassificationEval {
                truth,
                proba: &clf.predict_proba(x)?,
                n_classes: self.pipeline.classes.len(),
            }
            .scores(names),
            (Estimator::Regressor(reg), Targets::Values(truth)) => RegressionEval {
                truth,
                predicted: &reg.predict(x)?,
            }
            .scores(names),
            _ => Err(AutomlError::Training(
                "held-out targets do not match the estimator".to_string(),
            )),
        }
    }

    fn prepare(&self, data: &Table) -> Result<Features> {
        self.pipeline.preprocessor.transform_table(data)
    }

    fn predict(&self, features: &Features) -> Result<Vec<Prediction>> {
        let width = self.pipeline.preprocessor.columns.len();
        if let Some(row) = features.rows.iter().find(|r| r.len() != width) {
            return Err(AutomlError::DataPreparationFailed(format!(
                "expected {} features per row, got {}",
                width,
                row.len()
            )));
        }
        let predictions = match &self.pipeline.estimator {
            Estimator::Classifier(clf) => clf
                .predict_proba(&features.rows)?
                .iter()
                .map(|p| label_prediction(&self.pipeline.classes[argmax(p)]))
                .collect(),
            Estimator::Regressor(reg) => reg
                .predict(&features.rows)?
                .into_iter()
                .map(Prediction::Value)
                .collect(),
        };
        Ok(predictions)
    }

    fn save(&self, dir: &Path) -> Result<()> {
        let bytes = serde_json::to_vec_pretty(&self.pipeline)?;
        std::fs::write(dir.join(PIPELINE_FILE), bytes)?;
        Ok(())
    }
}

/// Numeric class labels come back as numbers, everything else as text.
fn label_prediction(label: &str) -> Prediction {
    match label.parse::<f64>() {
        Ok(v) if v.is_finite() => Prediction::Value(v),
        _ => Prediction::Label(label.to_string()),
    }
}
