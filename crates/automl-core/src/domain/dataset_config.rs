//! Dataset configuration read from `<dataset_root>/config.yaml`.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::error::{AutomlError, Result};
use super::task::TaskKind;

/// File name of the dataset configuration inside a dataset root.
pub const DATASET_CONFIG_FILE: &str = "config.yaml";

/// A target column referenced by name or by zero-based position.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum ColumnRef {
    Position(usize),
    Name(String),
}

/// One or several target columns.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum TargetColumns {
    Single(String),
    Many(Vec<ColumnRef>),
}

impl TargetColumns {
    /// The column the trainer predicts.
    pub fn primary(&self) -> Option<ColumnRef> {
        match self {
            TargetColumns::Single(name) => Some(ColumnRef::Name(name.clone())),
            TargetColumns::Many(refs) => refs.first().cloned(),
        }
    }
}

/// Structured dataset description consumed by training.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DatasetConfig {
    /// Task kind as written in the file; validated by [`DatasetConfig::task_kind`].
    pub task: String,
    /// CSV file, relative to the dataset root.
    pub train_dataset: PathBuf,
    pub target_columns: TargetColumns,
    #[serde(default)]
    pub index_col: Option<String>,
}

impl DatasetConfig {
    /// Read `config.yaml` from a dataset root directory.
    pub fn load(dataset_root: &Path) -> Result<Self> {
        let path = dataset_root.join(DATASET_CONFIG_FILE);
        let content = std::fs::read_to_string(&path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                AutomlError::InvalidDatasetConfig(format!(
                    "not found '{}' file by path {:?}",
                    DATASET_CONFIG_FILE, dataset_root
                ))
            } else {
                AutomlError::Io(e)
            }
        })?;
        Self::from_yaml(&content)
    }

    pub fn from_yaml(content: &str) -> Result<Self> {
        serde_yaml::from_str(content).map_err(|e| AutomlError::InvalidDatasetConfig(e.to_string()))
    }

    pub fn task_kind(&self) -> Result<TaskKind> {
        self.task.parse()
    }

    /// Absolute path of the training CSV given the dataset root.
    pub fn data_path(&self, dataset_root: &Path) -> PathBuf {
        dataset_root.join(&self.train_dataset)
    }
}
