//! Shared server state.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use automl_core::{AutoMlEngine, Lifecycle, ReplacePolicy};
use automl_state::Catalog;
use tokio::sync::{Mutex, RwLock};

use crate::settings::StorageSettings;

pub struct AppState {
    pub lifecycle: Lifecycle,
    pub catalog: Arc<dyn Catalog>,
    pub datasets_root: PathBuf,
    pub weights_root: PathBuf,
    pub policy: ReplacePolicy,
    pub started: Instant,
    /// One lock per dataset id over its weights directory. Training takes it
    /// for writing, metrics and prediction for reading.
    dataset_locks: Mutex<HashMap<i64, Arc<RwLock<()>>>>,
}

impl AppState {
    pub fn new(
        storage: &StorageSettings,
        catalog: Arc<dyn Catalog>,
        engine: Arc<dyn AutoMlEngine>,
    ) -> Self {
        Self {
            lifecycle: Lifecycle::new(engine),
            catalog,
            datasets_root: storage.datasets_root.clone(),
            weights_root: storage.weights_root.clone(),
            policy: storage.replace_policy,
            started: Instant::now(),
            dataset_locks: Mutex::new(HashMap::new()),
        }
    }

    /// Lock guarding the weights directory of `dataset_id`. Guards should be
    /// taken owned and moved into the blocking task that touches the
    /// directory, so a dropped request cannot release them early.
    pub async fn dataset_lock(&self, dataset_id: i64) -> Arc<RwLock<()>> {
        self.dataset_locks
            .lock()
            .await
            .entry(dataset_id)
            .or_default()
            .clone()
    }
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("datasets_root", &self.datasets_root)
            .field("weights_root", &self.weights_root)
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}
