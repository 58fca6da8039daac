//! Repository trait and catalog facade.
//!
//! All traits are async and backend-agnostic. In-memory fakes live in
//! [`crate::fakes`], the SurrealDB backend in [`crate::surreal_catalog`].

use async_trait::async_trait;
use serde_json::Value;

use crate::error::StorageError;
use crate::records::{Dataset, MlModel, PredictTask, Record};

/// Result type for repository operations
pub type StorageResult<T> = std::result::Result<T, StorageError>;

/// Equality filter on one record field.
#[derive(Debug, Clone, PartialEq)]
pub struct Filter {
    pub field: String,
    pub value: Value,
}

impl Filter {
    pub fn eq(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            field: field.into(),
            value: value.into(),
        }
    }
}

/// Reject filters on fields the record type does not expose.
pub(crate) fn validate_filters<R: Record>(filters: &[Filter]) -> StorageResult<()> {
    match filters.iter().find(|f| !R::FIELDS.contains(&f.field.as_str())) {
        Some(bad) => Err(StorageError::InvalidFilter {
            table: R::TABLE,
            field: bad.field.clone(),
        }),
        None => Ok(()),
    }
}

/// Generic CRUD over one record type.
#[async_trait]
pub trait Repository<R: Record>: Send + Sync {
    async fn get(&self, id: i64) -> StorageResult<Option<R>>;

    /// Records matching every filter, ordered by id.
    async fn get_all(&self, filters: &[Filter]) -> StorageResult<Vec<R>>;

    /// Insert a new record. Id `0` is replaced by the next free id; an
    /// explicit id that is taken is a `Conflict`.
    async fn create(&self, record: R) -> StorageResult<R>;

    /// Replace the record with the same id, inserting it if absent.
    async fn update(&self, record: R) -> StorageResult<R>;

    async fn exists(&self, filters: &[Filter]) -> StorageResult<bool> {
        Ok(!self.get_all(filters).await?.is_empty())
    }

    async fn find_one(&self, filters: &[Filter]) -> StorageResult<Option<R>> {
        Ok(self.get_all(filters).await?.into_iter().next())
    }

    /// Like `get`, but a missing record is `NotFound`.
    async fn require(&self, id: i64) -> StorageResult<R> {
        self.get(id)
            .await?
            .ok_or(StorageError::NotFound { table: R::TABLE, id })
    }
}

/// The three catalog tables behind one handle.
#[async_trait]
pub trait Catalog: Send + Sync {
    fn predict_tasks(&self) -> &dyn Repository<PredictTask>;
    fn datasets(&self) -> &dyn Repository<Dataset>;
    fn mlmodels(&self) -> &dyn Repository<MlModel>;

    /// Whether the backend answers.
    async fn ping(&self) -> bool;
}
