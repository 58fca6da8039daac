//! Artifact store: one directory per trained model, holding the engine's
//! serialized pipeline and a `metrics.yaml` written last.
//!
//! The directory `D` is only ever replaced as a whole through
//! [`save_if_better`]. Callers must serialise saves that target the same `D`.

pub mod metrics_file;
mod swap;

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::compare::DecisionRule;
use crate::domain::{AutomlError, Metrics, ModelArtifact, Result};
use crate::engine::FittedModel;
use crate::metrics::METRICS;
use crate::obs;

pub use metrics_file::METRICS_FILE;
pub use swap::{holder_path, HOLDER_PREFIX};

use swap::Swap;

/// Whether a fresh artifact overwrites an existing one.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReplacePolicy {
    /// Replace only when the candidate strictly beats the stored metrics.
    #[default]
    #[serde(rename = "best", alias = "always_replace_best")]
    Best,
    /// Always replace.
    #[serde(rename = "last", alias = "always_replace_last")]
    Last,
}

impl ReplacePolicy {
    pub fn as_str(self) -> &'static str {
        match self {
            ReplacePolicy::Best => "best",
            ReplacePolicy::Last => "last",
        }
    }
}

impl fmt::Display for ReplacePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReplacePolicy {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "best" | "always_replace_best" => Ok(ReplacePolicy::Best),
            "last" | "always_replace_last" => Ok(ReplacePolicy::Last),
            other => Err(format!(
                "unknown replace policy '{other}', expected 'best' or 'last'"
            )),
        }
    }
}

/// What [`recover`] found and did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Recovery {
    /// No interrupted swap.
    Clean,
    /// The new artifact was complete; the stale holder was removed.
    Completed,
    /// The new artifact was partial; the previous one was put back.
    RolledBack,
}

pub fn exists(dir: &Path) -> bool {
    dir.is_dir()
}

/// Stored metrics of the artifact at `dir`, or `None` if there is none.
pub fn load_metrics(dir: &Path) -> Result<Option<Metrics>> {
    metrics_file::read(dir)
}

/// Load a complete artifact description; `ArtifactNotFound` when absent.
pub fn load_artifact(dir: &Path) -> Result<ModelArtifact> {
    let metrics =
        load_metrics(dir)?.ok_or_else(|| AutomlError::ArtifactNotFound(dir.to_path_buf()))?;
    let name = dir
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    Ok(ModelArtifact {
        name,
        directory: dir.to_path_buf(),
        metrics,
    })
}

/// Names of complete artifacts directly under `root`, sorted.
pub fn list_artifacts(root: &Path) -> Result<Vec<String>> {
    if !root.is_dir() {
        return Ok(Vec::new());
    }
    let mut names = Vec::new();
    for entry in std::fs::read_dir(root)? {
        let entry = entry?;
        let name = entry.file_name().to_string_lossy().into_owned();
        if name.starts_with(HOLDER_PREFIX) {
            continue;
        }
        if metrics_file::path_in(&entry.path()).is_file() {
            names.push(name);
        }
    }
    names.sort();
    Ok(names)
}

/// Finish or undo a swap that was interrupted by a crash.
///
/// `metrics.yaml` is the last file written, so its presence in `dir` marks the
/// new artifact as complete.
pub fn recover(dir: &Path) -> Result<Recovery> {
    let holder = holder_path(dir)?;
    if !holder.exists() {
        return Ok(Recovery::Clean);
    }

    if metrics_file::path_in(dir).is_file() {
        std::fs::remove_dir_all(&holder)?;
        tracing::info!(dir = %dir.display(), "interrupted swap completed, holder removed");
        return Ok(Recovery::Completed);
    }

    if dir.exists() {
        std::fs::remove_dir_all(dir)?;
    }
    std::fs::rename(&holder, dir)?;
    tracing::warn!(dir = %dir.display(), "interrupted swap rolled back");
    Ok(Recovery::RolledBack)
}

/// [`save_if_better_with`] using the key-detecting comparison.
pub fn save_if_better(
    dir: &Path,
    model: &dyn FittedModel,
    new_metrics: &Metrics,
    policy: ReplacePolicy,
) -> Result<bool> {
    save_if_better_with(dir, model, new_metrics, policy, DecisionRule::ByBaselineKeys)
}

/// Persist `model` and `new_metrics` into `dir` if `policy` (and `rule`, for
/// [`ReplacePolicy::Best`]) says the candidate should replace what is there.
///
/// Returns whether the candidate was saved. On a write failure the previous
/// artifact is restored and `ArtifactSaveFailed` is returned.
pub fn save_if_better_with(
    dir: &Path,
    model: &dyn FittedModel,
    new_metrics: &Metrics,
    policy: ReplacePolicy,
    rule: DecisionRule,
) -> Result<bool> {
    recover(dir)?;
    let old_metrics = if exists(dir) { load_metrics(dir)? } else { None };

    let should_replace = match (policy, &old_metrics) {
        (ReplacePolicy::Last, _) | (ReplacePolicy::Best, None) => true,
        (ReplacePolicy::Best, Some(old)) => rule.is_better(new_metrics, old)?,
    };
    if !should_replace {
        if let Some(old) = &old_metrics {
            obs::emit_artifact_kept(dir, new_metrics, old);
        }
        METRICS.inc_kept();
        return Ok(false);
    }

    let swap = Swap::begin(dir).map_err(|e| save_failed(dir, e))?;
    let had_previous = swap.had_previous();
    match write_artifact(dir, model, new_metrics) {
        Ok(()) => {
            swap.commit();
            obs::emit_artifact_replaced(dir, had_previous);
            METRICS.inc_replaced();
            Ok(true)
        }
        Err(err) => {
            obs::emit_artifact_rollback(dir, &err);
            METRICS.inc_rollbacks();
            let reason = match swap.rollback() {
                Ok(()) => err.to_string(),
                Err(restore) => format!("{err}; restoring previous artifact also failed: {restore}"),
            };
            Err(AutomlError::ArtifactSaveFailed {
                path: dir.to_path_buf(),
                reason,
            })
        }
    }
}

fn write_artifact(dir: &Path, model: &dyn FittedModel, metrics: &Metrics) -> Result<()> {
    model.save(dir)?;
    metrics_file::write(dir, metrics)
}

fn save_failed(dir: &Path, err: AutomlError) -> AutomlError {
    match err {
        e @ AutomlError::ArtifactSaveFailed { .. } => e,
        other => AutomlError::ArtifactSaveFailed {
            path: dir.to_path_buf(),
            reason: other.to_string(),
        },
    }
}
