//! Training results and the persisted artifact they describe.

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Metric name → value. Ordered so that persisted files are stable.
pub type Metrics = BTreeMap<String, f64>;

/// Structural description of a fitted pipeline graph.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PipelineDescription {
    /// Longest path from input to output node.
    pub depth: usize,
    /// Total number of nodes.
    pub length: usize,
    /// Nodes rendered as strings, input first.
    pub nodes: Vec<String>,
}

impl PipelineDescription {
    /// Describe a linear chain of nodes.
    pub fn chain(nodes: Vec<String>) -> Self {
        Self {
            depth: nodes.len(),
            length: nodes.len(),
            nodes,
        }
    }
}

/// Result of one training cycle, returned to the caller and never persisted.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TrainingOutcome {
    pub pipeline: PipelineDescription,
    pub metrics: Metrics,
    /// Whether the new model now occupies the artifact directory.
    pub saved: bool,
}

/// A trained model as it sits on durable storage.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelArtifact {
    /// Unique name, usually the dataset name.
    pub name: String,
    pub directory: PathBuf,
    pub metrics: Metrics,
}
