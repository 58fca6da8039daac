//! Seed the catalog from JSON files of the form `{"data": [...]}`.
//!
//! Seeding is an upsert keyed by record name, so running it twice leaves
//! the catalog unchanged.

use std::path::Path;

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::info;

use crate::error::StorageError;
use crate::records::{Dataset, MlModel, PredictTask, Record};
use crate::repository::{Catalog, Filter, Repository, StorageResult};

#[derive(Debug, Deserialize)]
struct SeedFile<T> {
    data: Vec<T>,
}

/// Dataset entry; the task is referenced by name.
#[derive(Debug, Clone, Deserialize)]
pub struct DatasetSeed {
    pub name: String,
    #[serde(default)]
    pub title: Option<String>,
    pub task_name: String,
    pub target_column: String,
    #[serde(default)]
    pub index_column: Option<String>,
}

/// Model entry; the dataset is referenced by name.
#[derive(Debug, Clone, Deserialize)]
pub struct MlModelSeed {
    pub name: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    pub dataset_name: String,
    #[serde(default)]
    pub trained_at: Option<DateTime<Utc>>,
}

fn read_seed<T: DeserializeOwned>(path: &Path) -> StorageResult<Vec<T>> {
    let text = std::fs::read_to_string(path)
        .map_err(|e| StorageError::Seed(format!("{}: {}", path.display(), e)))?;
    let file: SeedFile<T> = serde_json::from_str(&text)
        .map_err(|e| StorageError::Seed(format!("{}: {}", path.display(), e)))?;
    Ok(file.data)
}

/// Insert the record, or overwrite the one with the same name.
async fn upsert_by_name<R: Record>(
    repo: &dyn Repository<R>,
    name: &str,
    mut record: R,
) -> StorageResult<R> {
    match repo.find_one(&[Filter::eq("name", name)]).await? {
        Some(existing) => {
            record.set_id(existing.id());
            repo.update(record).await
        }
        None => repo.create(record).await,
    }
}

async fn lookup_id<R: Record>(repo: &dyn Repository<R>, name: &str) -> StorageResult<i64> {
    repo.find_one(&[Filter::eq("name", name)])
        .await?
        .map(|r| r.id())
        .ok_or_else(|| StorageError::Seed(format!("unknown {} '{}'", R::TABLE, name)))
}

pub async fn seed_predict_tasks(catalog: &dyn Catalog, path: &Path) -> StorageResult<usize> {
    let tasks: Vec<PredictTask> = read_seed(path)?;
    let count = tasks.len();
    for task in tasks {
        let name = task.name.clone();
        upsert_by_name(catalog.predict_tasks(), &name, task).await?;
    }
    info!(count, "Seeded predict tasks");
    Ok(count)
}

pub async fn seed_datasets(catalog: &dyn Catalog, path: &Path) -> StorageResult<usize> {
    let seeds: Vec<DatasetSeed> = read_seed(path)?;
    let count = seeds.len();
    for seed in seeds {
        let task_id = lookup_id(catalog.predict_tasks(), &seed.task_name).await?;
        let dataset = Dataset {
            id: 0,
            name: seed.name.clone(),
            title: seed.title,
            task_id,
            target_column: seed.target_column,
            index_column: seed.index_column,
        };
        upsert_by_name(catalog.datasets(), &seed.name, dataset).await?;
    }
    info!(count, "Seeded datasets");
    Ok(count)
}

/// Each model must already have weights under `weights_root/<name>`.
pub async fn seed_mlmodels(
    catalog: &dyn Catalog,
    path: &Path,
    weights_root: &Path,
) -> StorageResult<usize> {
    let seeds: Vec<MlModelSeed> = read_seed(path)?;
    let count = seeds.len();
    for seed in seeds {
        let weights = weights_root.join(&seed.name);
        if !weights.is_dir() {
            return Err(StorageError::Seed(format!(
                "weights for '{}' not found at {}",
                seed.name,
                weights.display()
            )));
        }
        let dataset_id = lookup_id(catalog.datasets(), &seed.dataset_name).await?;
        let model = MlModel {
            id: 0,
            name: seed.name.clone(),
            title: seed.title,
            description: seed.description,
            dataset_id,
            trained_at: seed.trained_at.unwrap_or_else(Utc::now),
        };
        upsert_by_name(catalog.mlmodels(), &seed.name, model).await?;
    }
    info!(count, "Seeded mlmodels");
    Ok(count)
}
