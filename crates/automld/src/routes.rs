//! Route handlers.

use std::sync::Arc;

use automl_core::{predict_csv, Metrics, Prediction, TaskKind, TrainingOutcome, METRICS};
use automl_state::{Dataset, Filter, MlModel, PredictTask};
use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::info;

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

type AppStateRef = State<Arc<AppState>>;

/// Default training budget in minutes.
pub const DEFAULT_TIME_LIMIT: f64 = 5.0;

pub async fn health(State(state): AppStateRef) -> Json<Value> {
    let catalog = if state.catalog.ping().await {
        "ok"
    } else {
        "unavailable"
    };
    let artifacts = automl_core::list_artifacts(&state.weights_root)
        .map(|names| names.len())
        .unwrap_or_default();
    Json(json!({
        "status": "OK",
        "info": {
            "version": env!("CARGO_PKG_VERSION"),
            "uptime_secs": state.started.elapsed().as_secs(),
            "catalog": catalog,
            "artifacts": artifacts,
            "counters": METRICS.snapshot(),
        }
    }))
}

// ---------------------------------------------------------------------------
// Catalog listings
// ---------------------------------------------------------------------------

pub async fn list_datasets(State(state): AppStateRef) -> ApiResult<Json<Vec<Dataset>>> {
    Ok(Json(state.catalog.datasets().get_all(&[]).await?))
}

pub async fn get_dataset(
    State(state): AppStateRef,
    Path(id): Path<i64>,
) -> ApiResult<Json<Dataset>> {
    Ok(Json(state.catalog.datasets().require(id).await?))
}

pub async fn list_tasks(State(state): AppStateRef) -> ApiResult<Json<Vec<PredictTask>>> {
    Ok(Json(state.catalog.predict_tasks().get_all(&[]).await?))
}

pub async fn get_task(
    State(state): AppStateRef,
    Path(id): Path<i64>,
) -> ApiResult<Json<PredictTask>> {
    Ok(Json(state.catalog.predict_tasks().require(id).await?))
}

pub async fn list_mlmodels(State(state): AppStateRef) -> ApiResult<Json<Vec<MlModel>>> {
    Ok(Json(state.catalog.mlmodels().get_all(&[]).await?))
}

pub async fn get_mlmodel(
    State(state): AppStateRef,
    Path(id): Path<i64>,
) -> ApiResult<Json<MlModel>> {
    Ok(Json(state.catalog.mlmodels().require(id).await?))
}

pub async fn mlmodel_metrics(
    State(state): AppStateRef,
    Path(id): Path<i64>,
) -> ApiResult<Json<Metrics>> {
    let model = state.catalog.mlmodels().require(id).await?;
    let dir = state.weights_root.join(&model.name);
    let guard = state.dataset_lock(model.dataset_id).await.read_owned().await;
    let artifact = tokio::task::spawn_blocking(move || {
        let _guard = guard;
        automl_core::load_artifact(&dir)
    })
    .await??;
    Ok(Json(artifact.metrics))
}

// ---------------------------------------------------------------------------
// Prediction
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize, Deserialize)]
pub struct PredictResponse {
    pub mlmodel: i64,
    pub predicted_at: DateTime<Utc>,
    pub predictions: Vec<Prediction>,
}

/// Task kind of the dataset a model was trained on.
async fn task_of_dataset(state: &AppState, dataset: &Dataset) -> ApiResult<TaskKind> {
    let task = state.catalog.predict_tasks().require(dataset.task_id).await?;
    Ok(task.name.parse()?)
}

pub async fn predict(
    State(state): AppStateRef,
    Path(id): Path<i64>,
    body: Bytes,
) -> ApiResult<Json<PredictResponse>> {
    if body.is_empty() {
        return Err(ApiError::BadRequest("request body must be a CSV table".into()));
    }
    let model = state.catalog.mlmodels().require(id).await?;
    let dataset = state.catalog.datasets().require(model.dataset_id).await?;
    let task = task_of_dataset(&state, &dataset).await?;

    let dir = state.weights_root.join(&model.name);
    let lifecycle = state.lifecycle.clone();
    let guard = state.dataset_lock(model.dataset_id).await.read_owned().await;
    let predictions = tokio::task::spawn_blocking(move || {
        let _guard = guard;
        predict_csv(lifecycle.engine(), task, &dir, &body)
    })
    .await??;

    Ok(Json(PredictResponse {
        mlmodel: model.id,
        predicted_at: Utc::now(),
        predictions,
    }))
}

// ---------------------------------------------------------------------------
// Training
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct TrainRequest {
    /// Budget in minutes.
    #[serde(default = "default_time_limit")]
    pub time_limit: f64,
}

fn default_time_limit() -> f64 {
    DEFAULT_TIME_LIMIT
}

pub async fn train(
    State(state): AppStateRef,
    Path(id): Path<i64>,
    request: Option<Json<TrainRequest>>,
) -> ApiResult<Json<TrainingOutcome>> {
    let time_limit = request.map_or(DEFAULT_TIME_LIMIT, |Json(r)| r.time_limit);
    let dataset = state.catalog.datasets().require(id).await?;

    let guard = state.dataset_lock(dataset.id).await.write_owned().await;

    let dataset_root = state.datasets_root.join(&dataset.name);
    let weights = state.weights_root.join(&dataset.name);
    let lifecycle = state.lifecycle.clone();
    let policy = state.policy;
    info!(dataset = %dataset.name, time_limit, %policy, "Training requested");

    let outcome = tokio::task::spawn_blocking(move || {
        let _guard = guard;
        lifecycle.train_dataset(&dataset_root, &weights, time_limit, policy)
    })
    .await??;

    if outcome.saved {
        record_trained_model(&state, &dataset).await?;
    }
    Ok(Json(outcome))
}

/// Upsert the model record named after the dataset.
async fn record_trained_model(state: &AppState, dataset: &Dataset) -> ApiResult<MlModel> {
    let models = state.catalog.mlmodels();
    let record = match models
        .find_one(&[Filter::eq("name", dataset.name.as_str())])
        .await?
    {
        Some(existing) => MlModel {
            dataset_id: dataset.id,
            trained_at: Utc::now(),
            ..existing
        },
        None => MlModel {
            id: 0,
            name: dataset.name.clone(),
            title: dataset.title.clone(),
            description: None,
            dataset_id: dataset.id,
            trained_at: Utc::now(),
        },
    };
    Ok(models.update(record).await?)
}
