//! Error types for automl-state

use thiserror::Error;

/// Errors raised while connecting to or preparing the catalog database.
#[derive(Error, Debug)]
pub enum StateError {
    #[error("Database connection failed: {0}")]
    Connection(String),

    #[error("Database query failed: {0}")]
    Query(String),

    #[error("Schema setup failed: {0}")]
    SchemaSetup(String),
}

impl From<surrealdb::Error> for StateError {
    fn from(err: surrealdb::Error) -> Self {
        StateError::Query(err.to_string())
    }
}

/// Errors returned by repository operations.
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("{table} record {id} not found")]
    NotFound { table: &'static str, id: i64 },

    #[error("{table} record {id} already exists")]
    Conflict { table: &'static str, id: i64 },

    #[error("'{field}' is not a filterable field of {table}")]
    InvalidFilter { table: &'static str, field: String },

    #[error("Seeding failed: {0}")]
    Seed(String),

    #[error("Storage backend error: {0}")]
    Backend(String),
}

impl From<surrealdb::Error> for StorageError {
    fn from(err: surrealdb::Error) -> Self {
        StorageError::Backend(err.to_string())
    }
}
