//! SurrealDB schema for the catalog tables.
//!
//! Every table stores rows of the shape `{ uid, body }`: `uid` is the integer
//! record id and `body` the serialized record.

use surrealdb::engine::any::Any;
use surrealdb::Surreal;
use tracing::{debug, info};

use crate::error::StateError;
use crate::records::{Dataset, MlModel, PredictTask, Record};
use crate::Result;

/// Define all catalog tables and their indexes. Safe to call on every start.
pub async fn init_schema(db: &Surreal<Any>) -> Result<()> {
    info!("Initializing catalog schema");

    init_table::<PredictTask>(db).await?;
    init_table::<Dataset>(db).await?;
    init_table::<MlModel>(db).await?;

    info!("Catalog schema initialization complete");
    Ok(())
}

/// Ids and names are both unique per table.
async fn init_table<R: Record>(db: &Surreal<Any>) -> Result<()> {
    debug!(table = R::TABLE, "Initializing table");

    let table = R::TABLE;
    let sql = format!(
        r#"
        DEFINE TABLE IF NOT EXISTS {table} SCHEMALESS;
        DEFINE INDEX IF NOT EXISTS idx_{table}_uid ON TABLE {table} COLUMNS uid UNIQUE;
        DEFINE INDEX IF NOT EXISTS idx_{table}_name ON TABLE {table} COLUMNS body.name UNIQUE;
        "#
    );

    db.query(sql)
        .await
        .and_then(|res| res.check())
        .map_err(|e| StateError::SchemaSetup(format!("{table}: {e}")))?;
    Ok(())
}
