//! In-memory catalog for unit tests and for running without a database.

use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use serde_json::Value;

use crate::error::StorageError;
use crate::records::{Dataset, MlModel, PredictTask, Record};
use crate::repository::{validate_filters, Catalog, Filter, Repository, StorageResult};

/// Repository over a `BTreeMap` keyed by id.
pub struct MemoryRepository<R> {
    rows: Mutex<BTreeMap<i64, R>>,
}

impl<R: Record> MemoryRepository<R> {
    pub fn new() -> Self {
        Self {
            rows: Mutex::new(BTreeMap::new()),
        }
    }

    fn rows(&self) -> StorageResult<MutexGuard<'_, BTreeMap<i64, R>>> {
        self.rows
            .lock()
            .map_err(|_| StorageError::Backend(format!("{} lock poisoned", R::TABLE)))
    }
}

impl<R: Record> Default for MemoryRepository<R> {
    fn default() -> Self {
        Self::new()
    }
}

fn matches<R: Record>(record: &R, filters: &[Filter]) -> StorageResult<bool> {
    if filters.is_empty() {
        return Ok(true);
    }
    let value = serde_json::to_value(record).map_err(|e| StorageError::Backend(e.to_string()))?;
    Ok(filters
        .iter()
        .all(|f| value.get(&f.field).unwrap_or(&Value::Null) == &f.value))
}

#[async_trait]
impl<R: Record> Repository<R> for MemoryRepository<R> {
    async fn get(&self, id: i64) -> StorageResult<Option<R>> {
        Ok(self.rows()?.get(&id).cloned())
    }

    async fn get_all(&self, filters: &[Filter]) -> StorageResult<Vec<R>> {
        validate_filters::<R>(filters)?;
        let rows = self.rows()?;
        let mut out = Vec::new();
        for record in rows.values() {
            if matches(record, filters)? {
                out.push(record.clone());
            }
        }
        Ok(out)
    }

    async fn create(&self, mut record: R) -> StorageResult<R> {
        let mut rows = self.rows()?;
        if record.id() == 0 {
            let next = rows.keys().next_back().map_or(1, |last| last + 1);
            record.set_id(next);
        } else if rows.contains_key(&record.id()) {
            return Err(StorageError::Conflict {
                table: R::TABLE,
                id: record.id(),
            });
        }
        rows.insert(record.id(), record.clone());
        Ok(record)
    }

    async fn update(&self, record: R) -> StorageResult<R> {
        if record.id() == 0 {
            return self.create(record).await;
        }
        self.rows()?.insert(record.id(), record.clone());
        Ok(record)
    }
}

/// All three tables held in memory.
#[derive(Default)]
pub struct MemoryCatalog {
    tasks: MemoryRepository<PredictTask>,
    datasets: MemoryRepository<Dataset>,
    mlmodels: MemoryRepository<MlModel>,
}

impl MemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Catalog for MemoryCatalog {
    fn predict_tasks(&self) -> &dyn Repository<PredictTask> {
        &self.tasks
    }

    fn datasets(&self) -> &dyn Repository<Dataset> {
        &self.datasets
    }

    fn mlmodels(&self) -> &dyn Repository<MlModel> {
        &self.mlmodels
    }

    async fn ping(&self) -> bool {
        true
    }
}
