//! Catalog records: predict tasks, datasets and trained-model metadata.

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// A row type stored in one catalog table.
///
/// Ids are positive integers; a record with id `0` has not been stored yet
/// and gets the next free id on `create`.
pub trait Record: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {
    const TABLE: &'static str;
    /// Fields usable in equality filters.
    const FIELDS: &'static [&'static str];

    fn id(&self) -> i64;
    fn set_id(&mut self, id: i64);
}

/// A kind of prediction problem (e.g. classification).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PredictTask {
    #[serde(default)]
    pub id: i64,
    pub name: String,
}

impl Record for PredictTask {
    const TABLE: &'static str = "predict_tasks";
    const FIELDS: &'static [&'static str] = &["id", "name"];

    fn id(&self) -> i64 {
        self.id
    }

    fn set_id(&mut self, id: i64) {
        self.id = id;
    }
}

/// A dataset registered with the service. Its files live under
/// `<datasets_root>/<name>`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dataset {
    #[serde(default)]
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub title: Option<String>,
    pub task_id: i64,
    pub target_column: String,
    #[serde(default)]
    pub index_column: Option<String>,
}

impl Record for Dataset {
    const TABLE: &'static str = "datasets";
    const FIELDS: &'static [&'static str] =
        &["id", "name", "title", "task_id", "target_column", "index_column"];

    fn id(&self) -> i64 {
        self.id
    }

    fn set_id(&mut self, id: i64) {
        self.id = id;
    }
}

/// Metadata of a trained model. Weights live under `<weights_root>/<name>`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MlModel {
    #[serde(default)]
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    pub dataset_id: i64,
    #[serde(default = "Utc::now")]
    pub trained_at: DateTime<Utc>,
}

impl Record for MlModel {
    const TABLE: &'static str = "mlmodels";
    const FIELDS: &'static [&'static str] = &["id", "name", "title", "dataset_id"];

    fn id(&self) -> i64 {
        self.id
    }

    fn set_id(&mut self, id: i64) {
        self.id = id;
    }
}
