//! automl-state: record catalog for the AutoML service
//!
//! Holds the metadata the HTTP service lists and joins: predict tasks,
//! datasets and trained models. Model weights themselves live on disk and
//! are managed by `automl-core`; this crate only records that they exist.
//!
//! ## Key Components
//!
//! - [`Repository`]: async CRUD over one record type, with equality filters
//! - [`Catalog`]: the three tables behind one handle
//! - [`SurrealCatalog`]: SurrealDB backend (`mem://`, `surrealkv://`, `ws://`)
//! - [`MemoryCatalog`]: in-memory backend for tests
//! - [`seed`]: JSON seeders for first start

mod error;
pub mod fakes;
pub mod migrations;
pub mod records;
pub mod repository;
pub mod seed;
pub mod surreal_catalog;

pub use error::{StateError, StorageError};
pub use fakes::{MemoryCatalog, MemoryRepository};
pub use records::{Dataset, MlModel, PredictTask, Record};
pub use repository::{Catalog, Filter, Repository, StorageResult};
pub use surreal_catalog::{CatalogConfig, Credentials, SurrealCatalog};

/// Result type for connection and schema operations
pub type Result<T> = std::result::Result<T, StateError>;
