//! Replacement protocol of the artifact store: keep, replace, first save,
//! rollback on failed writes and crash recovery.

use std::fs;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::{Path, PathBuf};

use automl_core::store::{self, holder_path, Recovery, ReplacePolicy, METRICS_FILE};
use automl_core::{
    ArtifactDigest, AutomlError, DecisionRule, Features, FittedModel, Metrics,
    PipelineDescription, Prediction, Result, Table, TaskKind,
};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// How a scripted model behaves when asked to save itself.
#[derive(Clone, Copy)]
enum SaveScript {
    Succeed,
    /// Write part of the artifact, then fail.
    FailMidway,
    /// Write part of the artifact, then panic.
    PanicMidway,
}

struct ScriptedModel {
    pipeline: &'static str,
    script: SaveScript,
}

impl ScriptedModel {
    fn ok(pipeline: &'static str) -> Self {
        Self {
            pipeline,
            script: SaveScript::Succeed,
        }
    }

    fn with(pipeline: &'static str, script: SaveScript) -> Self {
        Self { pipeline, script }
    }
}

impl FittedModel for ScriptedModel {
    fn describe(&self) -> PipelineDescription {
        PipelineDescription::chain(vec![self.pipeline.to_string()])
    }

    fn get_metrics(&self, _names: &[&str]) -> Result<Metrics> {
        Ok(Metrics::new())
    }

    fn prepare(&self, _data: &Table) -> Result<Features> {
        Ok(Features { rows: Vec::new() })
    }

    fn predict(&self, _features: &Features) -> Result<Vec<Prediction>> {
        Ok(Vec::new())
    }

    fn save(&self, dir: &Path) -> Result<()> {
        fs::write(dir.join("pipeline.bin"), self.pipeline)?;
        match self.script {
            SaveScript::Succeed => {
                fs::write(dir.join("weights.bin"), [7u8; 64])?;
                Ok(())
            }
            SaveScript::FailMidway => Err(AutomlError::Io(std::io::Error::new(
                std::io::ErrorKind::Other,
                "disk full",
            ))),
            SaveScript::PanicMidway => panic!("serializer crashed"),
        }
    }
}

fn metrics(pairs: &[(&str, f64)]) -> Metrics {
    pairs.iter().map(|(k, v)| (k.to_string(), *v)).collect()
}

fn seeded_artifact(root: &Path, m: &Metrics) -> PathBuf {
    let dir = root.join("iris");
    let saved = store::save_if_better(&dir, &ScriptedModel::ok("v1"), m, ReplacePolicy::Best)
        .expect("seed artifact");
    assert!(saved);
    dir
}

// ---------------------------------------------------------------------------
// Decisions
// ---------------------------------------------------------------------------

#[test]
fn worse_candidate_leaves_artifact_untouched() {
    let root = tempfile::tempdir().unwrap();
    let dir = seeded_artifact(root.path(), &metrics(&[("roc_auc", 0.9)]));
    let before = ArtifactDigest::of_dir(&dir).unwrap();

    let saved = store::save_if_better(
        &dir,
        &ScriptedModel::ok("v2"),
        &metrics(&[("roc_auc", 0.8)]),
        ReplacePolicy::Best,
    )
    .unwrap();

    assert!(!saved);
    assert_eq!(ArtifactDigest::of_dir(&dir).unwrap(), before);
}

#[test]
fn equal_candidate_is_not_saved() {
    let root = tempfile::tempdir().unwrap();
    let dir = seeded_artifact(root.path(), &metrics(&[("mse", 3.0)]));
    let saved = store::save_if_better(
        &dir,
        &ScriptedModel::ok("v2"),
        &metrics(&[("mse", 3.0)]),
        ReplacePolicy::Best,
    )
    .unwrap();
    assert!(!saved);
    assert_eq!(fs::read_to_string(dir.join("pipeline.bin")).unwrap(), "v1");
}

#[test]
fn better_candidate_replaces_artifact() {
    let root = tempfile::tempdir().unwrap();
    let dir = seeded_artifact(root.path(), &metrics(&[("mse", 10.0)]));

    let saved = store::save_if_better(
        &dir,
        &ScriptedModel::ok("v2"),
        &metrics(&[("mse", 5.0)]),
        ReplacePolicy::Best,
    )
    .unwrap();

    assert!(saved);
    let text = fs::read_to_string(dir.join(METRICS_FILE)).unwrap();
    assert!(text.contains("mse: 5.0"), "{text}");
    assert_eq!(fs::read_to_string(dir.join("pipeline.bin")).unwrap(), "v2");
    assert!(!holder_path(&dir).unwrap().exists());
}

#[test]
fn nan_baseline_is_replaced_by_any_candidate() {
    let root = tempfile::tempdir().unwrap();
    let dir = root.path().join("iris");
    store::save_if_better(
        &dir,
        &ScriptedModel::ok("v1"),
        &metrics(&[("roc_auc", f64::NAN)]),
        ReplacePolicy::Last,
    )
    .unwrap();
    let stored = store::load_metrics(&dir).unwrap().unwrap();
    assert!(stored["roc_auc"].is_nan());

    let saved = store::save_if_better(
        &dir,
        &ScriptedModel::ok("v2"),
        &metrics(&[("roc_auc", 0.1)]),
        ReplacePolicy::Best,
    )
    .unwrap();
    assert!(saved);
    assert_eq!(fs::read_to_string(dir.join("pipeline.bin")).unwrap(), "v2");

    // and a NaN candidate never displaces a real number
    let saved = store::save_if_better(
        &dir,
        &ScriptedModel::ok("v3"),
        &metrics(&[("roc_auc", f64::NAN)]),
        ReplacePolicy::Best,
    )
    .unwrap();
    assert!(!saved);
}

#[test]
fn first_save_creates_directory() {
    let root = tempfile::tempdir().unwrap();
    let dir = root.path().join("weights").join("boston");
    assert!(!store::exists(&dir));

    let m = metrics(&[("mse", 42.0), ("mae", 3.5)]);
    let saved =
        store::save_if_better(&dir, &ScriptedModel::ok("v1"), &m, ReplacePolicy::Best).unwrap();

    assert!(saved);
    assert!(store::exists(&dir));
    assert_eq!(store::load_metrics(&dir).unwrap(), Some(m));
    assert!(dir.join("pipeline.bin").is_file());
}

#[test]
fn metrics_round_trip_through_store() {
    let root = tempfile::tempdir().unwrap();
    let m = metrics(&[("roc_auc", 0.123456789), ("f1", 1.0 / 3.0), ("accuracy", 0.1 + 0.2)]);
    let dir = seeded_artifact(root.path(), &m);
    assert_eq!(store::load_metrics(&dir).unwrap(), Some(m));
}

#[test]
fn unrecognised_baseline_is_an_error_and_changes_nothing() {
    let root = tempfile::tempdir().unwrap();
    let dir = seeded_artifact(root.path(), &metrics(&[("f1", 0.5)]));
    let before = ArtifactDigest::of_dir(&dir).unwrap();

    let err = store::save_if_better(
        &dir,
        &ScriptedModel::ok("v2"),
        &metrics(&[("f1", 0.9)]),
        ReplacePolicy::Best,
    )
    .unwrap_err();

    assert!(matches!(err, AutomlError::UnsupportedMetricSet { .. }));
    assert_eq!(ArtifactDigest::of_dir(&dir).unwrap(), before);
}

#[test]
fn task_rule_decides_on_task_metric() {
    let root = tempfile::tempdir().unwrap();
    // Baseline carries both keys; key detection would pick mse.
    let dir = seeded_artifact(root.path(), &metrics(&[("mse", 1.0), ("roc_auc", 0.7)]));

    let saved = store::save_if_better_with(
        &dir,
        &ScriptedModel::ok("v2"),
        &metrics(&[("mse", 9.0), ("roc_auc", 0.8)]),
        ReplacePolicy::Best,
        DecisionRule::ForTask(TaskKind::Classification),
    )
    .unwrap();
    assert!(saved);
}

// ---------------------------------------------------------------------------
// Rollback
// ---------------------------------------------------------------------------

#[test]
fn failed_write_restores_previous_artifact() {
    let root = tempfile::tempdir().unwrap();
    let dir = seeded_artifact(root.path(), &metrics(&[("mse", 10.0)]));
    let before = ArtifactDigest::of_dir(&dir).unwrap();

    let err = store::save_if_better(
        &dir,
        &ScriptedModel::with("v2", SaveScript::FailMidway),
        &metrics(&[("mse", 1.0)]),
        ReplacePolicy::Best,
    )
    .unwrap_err();

    match err {
        AutomlError::ArtifactSaveFailed { path, reason } => {
            assert_eq!(path, dir);
            assert!(reason.contains("disk full"), "{reason}");
        }
        other => panic!("expected ArtifactSaveFailed, got {other:?}"),
    }
    assert_eq!(ArtifactDigest::of_dir(&dir).unwrap(), before);
    assert_eq!(
        store::load_metrics(&dir).unwrap(),
        Some(metrics(&[("mse", 10.0)]))
    );
    assert!(!holder_path(&dir).unwrap().exists());
}

#[test]
fn failed_first_save_leaves_no_directory() {
    let root = tempfile::tempdir().unwrap();
    let dir = root.path().join("fresh");
    let err = store::save_if_better(
        &dir,
        &ScriptedModel::with("v1", SaveScript::FailMidway),
        &metrics(&[("roc_auc", 0.9)]),
        ReplacePolicy::Last,
    )
    .unwrap_err();
    assert!(matches!(err, AutomlError::ArtifactSaveFailed { .. }));
    assert!(!dir.exists());
}

#[test]
fn panic_during_write_restores_previous_artifact() {
    let root = tempfile::tempdir().unwrap();
    let dir = seeded_artifact(root.path(), &metrics(&[("roc_auc", 0.6)]));
    let before = ArtifactDigest::of_dir(&dir).unwrap();

    let outcome = catch_unwind(AssertUnwindSafe(|| {
        store::save_if_better(
            &dir,
            &ScriptedModel::with("v2", SaveScript::PanicMidway),
            &metrics(&[("roc_auc", 0.99)]),
            ReplacePolicy::Best,
        )
    }));

    assert!(outcome.is_err());
    assert_eq!(ArtifactDigest::of_dir(&dir).unwrap(), before);
    assert!(!holder_path(&dir).unwrap().exists());
}

// ---------------------------------------------------------------------------
// Crash recovery
// ---------------------------------------------------------------------------

#[test]
fn save_recovers_interrupted_swap_before_comparing() {
    let root = tempfile::tempdir().unwrap();
    let dir = seeded_artifact(root.path(), &metrics(&[("mse", 4.0)]));
    let before = ArtifactDigest::of_dir(&dir).unwrap();

    // Simulate a crash after the rename-aside and a partial write.
    let holder = holder_path(&dir).unwrap();
    fs::rename(&dir, &holder).unwrap();
    fs::create_dir(&dir).unwrap();
    fs::write(dir.join("pipeline.bin"), "half").unwrap();

    let saved = store::save_if_better(
        &dir,
        &ScriptedModel::ok("v2"),
        &metrics(&[("mse", 8.0)]),
        ReplacePolicy::Best,
    )
    .unwrap();

    assert!(!saved, "candidate is worse than the recovered baseline");
    assert_eq!(ArtifactDigest::of_dir(&dir).unwrap(), before);
    assert!(!holder.exists());
}

#[test]
fn recover_is_idempotent() {
    let root = tempfile::tempdir().unwrap();
    let dir = seeded_artifact(root.path(), &metrics(&[("mse", 4.0)]));
    assert_eq!(store::recover(&dir).unwrap(), Recovery::Clean);
    assert_eq!(store::recover(&dir).unwrap(), Recovery::Clean);
}
