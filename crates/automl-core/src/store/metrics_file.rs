//! `metrics.yaml`: a flat, block-style mapping of metric name to float.

use std::io::Write;
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;

use crate::domain::{AutomlError, Metrics, Result};

pub const METRICS_FILE: &str = "metrics.yaml";

pub fn path_in(dir: &Path) -> PathBuf {
    dir.join(METRICS_FILE)
}

/// Read `dir/metrics.yaml`. `Ok(None)` when the file does not exist.
pub fn read(dir: &Path) -> Result<Option<Metrics>> {
    let path = path_in(dir);
    let content = match std::fs::read_to_string(&path) {
        Ok(c) => c,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => {
            return Err(AutomlError::CorruptMetricsFile {
                path,
                reason: e.to_string(),
            })
        }
    };
    serde_yaml::from_str::<Metrics>(&content)
        .map(Some)
        .map_err(|e| AutomlError::CorruptMetricsFile {
            path,
            reason: e.to_string(),
        })
}

/// Write `dir/metrics.yaml` through a temp file in the same directory, so the
/// file appears complete or not at all.
pub fn write(dir: &Path, metrics: &Metrics) -> Result<()> {
    let yaml = serde_yaml::to_string(metrics).map_err(|e| AutomlError::ArtifactSaveFailed {
        path: path_in(dir),
        reason: e.to_string(),
    })?;
    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(yaml.as_bytes())?;
    tmp.as_file().sync_all()?;
    tmp.persist(path_in(dir)).map_err(|e| e.error)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Metrics {
        [("mse", 5.0), ("mae", 1.25), ("r2", -0.1)]
            .into_iter()
            .map(|(k, v)| (k.to_string(), v))
            .collect()
    }

    #[test]
    fn write_then_read_preserves_mapping() {
        let dir = tempfile::tempdir().unwrap();
        let m = sample();
        write(dir.path(), &m).unwrap();
        assert_eq!(read(dir.path()).unwrap(), Some(m));
    }

    #[test]
    fn file_is_block_style() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), &sample()).unwrap();
        let text = std::fs::read_to_string(path_in(dir.path())).unwrap();
        assert!(text.contains("mse: 5.0"), "{text}");
        assert!(!text.contains('{'));
    }

    #[test]
    fn missing_file_is_none() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(read(dir.path()).unwrap(), None);
        assert_eq!(read(&dir.path().join("absent")).unwrap(), None);
    }

    #[test]
    fn unparsable_file_is_corrupt() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(path_in(dir.path()), "mse: [not a float\n").unwrap();
        assert!(matches!(
            read(dir.path()),
            Err(AutomlError::CorruptMetricsFile { .. })
        ));

        std::fs::write(path_in(dir.path()), "mse: fast\n").unwrap();
        assert!(matches!(
            read(dir.path()),
            Err(AutomlError::CorruptMetricsFile { .. })
        ));
    }

    #[test]
    fn no_temp_files_left_behind() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), &sample()).unwrap();
        let names: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(names, vec![std::ffi::OsString::from(METRICS_FILE)]);
    }
}
