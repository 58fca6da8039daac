//! automld: HTTP service over the AutoML lifecycle
//!
//! Serves the record catalog, stored model metrics, prediction and training.
//! Training and prediction are CPU-bound and run on blocking workers. A
//! per-dataset read/write lock keeps readers off a weights directory while a
//! training cycle may be swapping it.

pub mod error;
pub mod routes;
pub mod settings;
pub mod state;

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use automl_core::{BaselineEngine, METRICS};
use automl_state::seed::{seed_datasets, seed_mlmodels, seed_predict_tasks};
use automl_state::{Catalog, SurrealCatalog};
use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;
use tower_http::trace::TraceLayer;
use tracing::info;

pub use error::{ApiError, ApiResult};
pub use settings::Settings;
pub use state::AppState;

/// Largest accepted upload.
const MAX_BODY_BYTES: usize = 64 * 1024 * 1024;

/// Build the application router, mounted under `prefix`.
pub fn router(state: Arc<AppState>, prefix: &str) -> Router {
    let api = Router::new()
        .route("/health", get(routes::health))
        .route("/datasets", get(routes::list_datasets))
        .route("/datasets/:id", get(routes::get_dataset))
        .route("/datasets/:id/train", post(routes::train))
        .route("/tasks", get(routes::list_tasks))
        .route("/tasks/:id", get(routes::get_task))
        .route("/mlmodels", get(routes::list_mlmodels))
        .route("/mlmodels/:id", get(routes::get_mlmodel))
        .route("/mlmodels/:id/metrics", get(routes::mlmodel_metrics))
        .route("/mlmodels/:id/predict", post(routes::predict));

    let prefix = prefix.trim_matches('/');
    let app = if prefix.is_empty() {
        api
    } else {
        Router::new().nest(&format!("/{prefix}"), api)
    };

    app.layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Apply the configured seed files, tasks first so names resolve.
pub async fn seed_catalog(catalog: &dyn Catalog, settings: &Settings) -> Result<()> {
    let seeding = &settings.seeding;
    if let Some(path) = &seeding.predict_tasks {
        seed_predict_tasks(catalog, path)
            .await
            .context("Failed to seed predict tasks")?;
    }
    if let Some(path) = &seeding.datasets {
        seed_datasets(catalog, path)
            .await
            .context("Failed to seed datasets")?;
    }
    if let Some(path) = &seeding.mlmodels {
        seed_mlmodels(catalog, path, &settings.storage.weights_root)
            .await
            .context("Failed to seed mlmodels")?;
    }
    Ok(())
}

fn ensure_dir(path: &Path) -> Result<()> {
    std::fs::create_dir_all(path).with_context(|| format!("Failed to create {}", path.display()))
}

/// Connect the catalog, seed it, and serve until Ctrl-C.
pub async fn serve(settings: Settings) -> Result<()> {
    ensure_dir(&settings.storage.datasets_root)?;
    ensure_dir(&settings.storage.weights_root)?;

    let catalog = SurrealCatalog::connect(&settings.catalog_config())
        .await
        .context("Failed to connect to catalog database")?;
    seed_catalog(&catalog, &settings).await?;

    let state = Arc::new(AppState::new(
        &settings.storage,
        Arc::new(catalog),
        Arc::new(BaselineEngine::new()),
    ));
    let app = router(state, &settings.api.prefix);

    let addr = settings.bind_addr();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    info!(%addr, prefix = %settings.api.prefix, "automld listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    METRICS.flush();
    info!("automld stopped");
    Ok(())
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_err() {
        std::future::pending::<()>().await;
    }
}
