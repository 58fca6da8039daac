//! SurrealDB-backed catalog.
//!
//! Works with any engine the `any` connector understands: `mem://` for tests,
//! `surrealkv://<path>` for a local file store, `ws://`/`wss://` for a server.

use std::marker::PhantomData;
use std::path::Path;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use surrealdb::engine::any::Any;
use surrealdb::opt::auth::{Database, Root};
use surrealdb::Surreal;
use tracing::{debug, info, instrument};

use crate::error::{StateError, StorageError};
use crate::migrations;
use crate::records::{Dataset, MlModel, PredictTask, Record};
use crate::repository::{validate_filters, Catalog, Filter, Repository, StorageResult};
use crate::Result;

/// Credentials for a server connection.
#[derive(Debug, Clone)]
pub struct Credentials {
    pub username: String,
    pub password: String,
    /// Root user (true) or database user (false).
    pub is_root: bool,
}

/// Where the catalog lives.
#[derive(Debug, Clone)]
pub struct CatalogConfig {
    pub url: String,
    pub namespace: String,
    pub database: String,
    pub credentials: Option<Credentials>,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            url: "mem://".to_string(),
            namespace: "automl".to_string(),
            database: "main".to_string(),
            credentials: None,
        }
    }
}

impl CatalogConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Self::default()
        }
    }

    pub fn with_namespace(mut self, ns: impl Into<String>) -> Self {
        self.namespace = ns.into();
        self
    }

    pub fn with_database(mut self, db: impl Into<String>) -> Self {
        self.database = db.into();
        self
    }

    pub fn with_credentials(mut self, credentials: Credentials) -> Self {
        self.credentials = Some(credentials);
        self
    }

    /// Create from environment variables
    ///
    /// Reads:
    /// - SURREALDB_URL (optional, default: "mem://")
    /// - SURREALDB_NAMESPACE (optional, default: "automl")
    /// - SURREALDB_DATABASE (optional, default: "main")
    /// - SURREALDB_USERNAME / SURREALDB_PASSWORD (optional, both or neither)
    /// - SURREALDB_ROOT (optional, default: "false")
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let credentials = match (
            std::env::var("SURREALDB_USERNAME"),
            std::env::var("SURREALDB_PASSWORD"),
        ) {
            (Ok(username), Ok(password)) => Some(Credentials {
                username,
                password,
                is_root: std::env::var("SURREALDB_ROOT")
                    .map(|v| v.to_lowercase() == "true")
                    .unwrap_or(false),
            }),
            _ => None,
        };
        Self {
            url: std::env::var("SURREALDB_URL").unwrap_or(defaults.url),
            namespace: std::env::var("SURREALDB_NAMESPACE").unwrap_or(defaults.namespace),
            database: std::env::var("SURREALDB_DATABASE").unwrap_or(defaults.database),
            credentials,
        }
    }
}

/// Stored row: integer id plus the serialized record.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct Row<R> {
    uid: i64,
    body: R,
}

#[derive(Debug, Deserialize)]
struct UidRow {
    uid: i64,
}

/// Repository over one SurrealDB table.
pub struct SurrealRepository<R> {
    db: Surreal<Any>,
    _record: PhantomData<fn() -> R>,
}

impl<R: Record> SurrealRepository<R> {
    fn new(db: Surreal<Any>) -> Self {
        Self {
            db,
            _record: PhantomData,
        }
    }

    async fn next_id(&self) -> StorageResult<i64> {
        let mut res = self
            .db
            .query("SELECT uid FROM type::table($tb) ORDER BY uid DESC LIMIT 1")
            .bind(("tb", R::TABLE))
            .await?;
        let rows: Vec<UidRow> = res.take(0)?;
        Ok(rows.first().map_or(1, |r| r.uid + 1))
    }

    async fn insert(&self, record: R) -> StorageResult<R> {
        let row = Row {
            uid: record.id(),
            body: record.clone(),
        };
        let _created: Option<Row<R>> = self.db.create(R::TABLE).content(row).await?;
        Ok(record)
    }
}

/// `WHERE` clause over validated field names; values are bound as `$f0..`.
fn where_clause(filters: &[Filter]) -> String {
    if filters.is_empty() {
        return String::new();
    }
    let terms: Vec<String> = filters
        .iter()
        .enumerate()
        .map(|(i, f)| format!("body.{} = $f{i}", f.field))
        .collect();
    format!(" WHERE {}", terms.join(" AND "))
}

#[async_trait]
impl<R: Record> Repository<R> for SurrealRepository<R> {
    async fn get(&self, id: i64) -> StorageResult<Option<R>> {
        let mut res = self
            .db
            .query("SELECT uid, body FROM type::table($tb) WHERE uid = $uid")
            .bind(("tb", R::TABLE))
            .bind(("uid", id))
            .await?;
        let rows: Vec<Row<R>> = res.take(0)?;
        Ok(rows.into_iter().next().map(|r| r.body))
    }

    async fn get_all(&self, filters: &[Filter]) -> StorageResult<Vec<R>> {
        validate_filters::<R>(filters)?;
        let sql = format!(
            "SELECT uid, body FROM type::table($tb){} ORDER BY uid ASC",
            where_clause(filters)
        );
        let mut query = self.db.query(sql).bind(("tb", R::TABLE));
        for (i, f) in filters.iter().enumerate() {
            query = query.bind((format!("f{i}"), f.value.clone()));
        }
        let mut res = query.await?;
        let rows: Vec<Row<R>> = res.take(0)?;
        Ok(rows.into_iter().map(|r| r.body).collect())
    }

    async fn create(&self, mut record: R) -> StorageResult<R> {
        if record.id() == 0 {
            record.set_id(self.next_id().await?);
        } else if self.get(record.id()).await?.is_some() {
            return Err(StorageError::Conflict {
                table: R::TABLE,
                id: record.id(),
            });
        }
        debug!(table = R::TABLE, id = record.id(), "Creating record");
        self.insert(record).await
    }

    async fn update(&self, record: R) -> StorageResult<R> {
        if record.id() == 0 {
            return self.create(record).await;
        }
        let mut res = self
            .db
            .query("UPDATE type::table($tb) SET body = $body WHERE uid = $uid RETURN AFTER")
            .bind(("tb", R::TABLE))
            .bind(("body", record.clone()))
            .bind(("uid", record.id()))
            .await?;
        let updated: Vec<Row<R>> = res.take(0)?;
        if updated.is_empty() {
            return self.insert(record).await;
        }
        Ok(record)
    }
}

/// Catalog handle over one SurrealDB connection.
pub struct SurrealCatalog {
    db: Surreal<Any>,
    tasks: SurrealRepository<PredictTask>,
    datasets: SurrealRepository<Dataset>,
    mlmodels: SurrealRepository<MlModel>,
}

impl SurrealCatalog {
    /// Connect to an in-memory instance with the schema in place.
    pub async fn in_memory() -> Result<Self> {
        Self::connect(&CatalogConfig::default()).await
    }

    /// Connect, authenticate if credentials are given, select the
    /// namespace and database, and initialize the schema.
    #[instrument(skip(config), fields(url = %config.url, namespace = %config.namespace, database = %config.database))]
    pub async fn connect(config: &CatalogConfig) -> Result<Self> {
        info!("Connecting to catalog database");

        if let Some(path) = config.url.strip_prefix("surrealkv://") {
            if let Some(parent) = Path::new(path).parent() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    StateError::Connection(format!("Failed to create {}: {}", parent.display(), e))
                })?;
            }
        }

        let db = surrealdb::engine::any::connect(config.url.as_str())
            .await
            .map_err(|e| {
                StateError::Connection(format!("Failed to connect to {}: {}", config.url, e))
            })?;

        if let Some(creds) = &config.credentials {
            let signed_in = if creds.is_root {
                db.signin(Root {
                    username: &creds.username,
                    password: &creds.password,
                })
                .await
                .map(|_| ())
            } else {
                db.signin(Database {
                    namespace: &config.namespace,
                    database: &config.database,
                    username: &creds.username,
                    password: &creds.password,
                })
                .await
                .map(|_| ())
            };
            signed_in
                .map_err(|e| StateError::Connection(format!("Authentication failed: {}", e)))?;
        }

        db.use_ns(config.namespace.as_str())
            .use_db(config.database.as_str())
            .await
            .map_err(|e| {
                StateError::Connection(format!("Failed to select namespace/database: {}", e))
            })?;

        migrations::init_schema(&db).await?;

        info!("Catalog database connected and schema initialized");
        Ok(Self {
            tasks: SurrealRepository::new(db.clone()),
            datasets: SurrealRepository::new(db.clone()),
            mlmodels: SurrealRepository::new(db.clone()),
            db,
        })
    }
}

#[async_trait]
impl Catalog for SurrealCatalog {
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
        self.db.health().await.is_ok()
    }
}
