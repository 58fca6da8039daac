//! Service settings.
//!
//! Sources, later ones winning: built-in defaults, an optional settings file
//! (any format the `config` crate knows, picked by extension), then
//! environment variables such as `APP__RUN__PORT=9000`.

use std::path::{Path, PathBuf};

use automl_core::ReplacePolicy;
use automl_state::{CatalogConfig, Credentials};
use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub run: RunSettings,
    pub api: ApiSettings,
    pub storage: StorageSettings,
    pub db: DbSettings,
    #[serde(default)]
    pub seeding: SeedingSettings,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RunSettings {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiSettings {
    /// Mount point of every route, e.g. `/api`. Empty mounts at the root.
    pub prefix: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageSettings {
    /// One directory per dataset, each with a `config.yaml`.
    pub datasets_root: PathBuf,
    /// One artifact directory per trained model.
    pub weights_root: PathBuf,
    pub replace_policy: ReplacePolicy,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DbSettings {
    pub url: String,
    pub namespace: String,
    pub database: String,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub root: bool,
}

/// Optional JSON seed files applied at start-up.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SeedingSettings {
    pub predict_tasks: Option<PathBuf>,
    pub datasets: Option<PathBuf>,
    pub mlmodels: Option<PathBuf>,
}

impl Settings {
    pub fn load(file: Option<&Path>) -> Result<Self, ConfigError> {
        let mut builder = Config::builder()
            .set_default("run.host", "0.0.0.0")?
            .set_default("run.port", 8000)?
            .set_default("api.prefix", "/api")?
            .set_default("storage.datasets_root", "data/datasets")?
            .set_default("storage.weights_root", "data/weights")?
            .set_default("storage.replace_policy", "best")?
            .set_default("db.url", "mem://")?
            .set_default("db.namespace", "automl")?
            .set_default("db.database", "main")?;

        if let Some(path) = file {
            builder = builder.add_source(File::from(path).required(true));
        } else {
            builder = builder.add_source(File::with_name("automld").required(false));
        }

        builder
            .add_source(
                Environment::with_prefix("APP")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.run.host, self.run.port)
    }

    pub fn catalog_config(&self) -> CatalogConfig {
        let mut config = CatalogConfig::new(self.db.url.clone())
            .with_namespace(self.db.namespace.clone())
            .with_database(self.db.database.clone());
        if let (Some(username), Some(password)) = (&self.db.username, &self.db.password) {
            config = config.with_credentials(Credentials {
                username: username.clone(),
                password: password.clone(),
                is_root: self.db.root,
            });
        }
        config
    }
}
