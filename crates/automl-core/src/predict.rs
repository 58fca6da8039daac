//! Prediction with a stored artifact.

use std::path::Path;
use std::time::Instant;

use crate::domain::{AutomlError, Result, TaskKind};
use crate::engine::{AutoMlEngine, Prediction, Table};
use crate::metrics::METRICS;
use crate::obs;
use crate::store;

/// Predict one value per row of `data` with the model stored in `weights_dir`.
///
/// A missing artifact is `ArtifactNotFound`. Empty input or columns that do
/// not fit the trained schema are `DataPreparationFailed`.
pub fn predict(
    engine: &dyn AutoMlEngine,
    task: TaskKind,
    weights_dir: &Path,
    data: &Table,
) -> Result<Vec<Prediction>> {
    if !store::exists(weights_dir) {
        return Err(AutomlError::ArtifactNotFound(weights_dir.to_path_buf()));
    }
    if data.is_empty() {
        return Err(AutomlError::DataPreparationFailed(
            "no rows to predict".to_string(),
        ));
    }

    let started = Instant::now();
    let model = engine.load(task, weights_dir)?;
    let features = model.prepare(data)?;
    let predictions = model.predict(&features)?;

    obs::emit_predict_finished(
        weights_dir,
        predictions.len(),
        started.elapsed().as_millis() as u64,
    );
    METRICS.add_predictions(predictions.len() as u64);
    Ok(predictions)
}

/// [`predict`] over raw CSV bytes, as uploaded by a client.
pub fn predict_csv(
    engine: &dyn AutoMlEngine,
    task: TaskKind,
    weights_dir: &Path,
    csv: &[u8],
) -> Result<Vec<Prediction>> {
    if !store::exists(weights_dir) {
        return Err(AutomlError::ArtifactNotFound(weights_dir.to_path_buf()));
    }
    let table = Table::from_csv_bytes(csv)?;
    predict(engine, task, weights_dir, &table)
}
