//! Rollback point for replacing an artifact directory.
//!
//! [`Swap::begin`] renames the live directory `D` aside to a holder `D'` in
//! the same parent and creates a fresh, empty `D`. Until [`Swap::commit`] is
//! called, dropping the swap (early return, panic) or calling
//! [`Swap::rollback`] removes the partial `D` and renames `D'` back.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::domain::{AutomlError, Result};
use crate::obs;

/// Prefix of holder directories. Names starting with it are never artifacts.
pub const HOLDER_PREFIX: &str = ".aside-";

/// Holder path for `target`: same parent, reserved prefix.
pub fn holder_path(target: &Path) -> Result<PathBuf> {
    let name = target
        .file_name()
        .ok_or_else(|| AutomlError::ArtifactSaveFailed {
            path: target.to_path_buf(),
            reason: "artifact path has no final component".to_string(),
        })?;
    let mut holder_name = std::ffi::OsString::from(HOLDER_PREFIX);
    holder_name.push(name);
    Ok(target.with_file_name(holder_name))
}

#[derive(Debug)]
pub(crate) struct Swap {
    target: PathBuf,
    holder: Option<PathBuf>,
    armed: bool,
}

impl Swap {
    pub(crate) fn begin(target: &Path) -> Result<Self> {
        let holder = holder_path(target)?;
        if holder.exists() {
            return Err(AutomlError::ArtifactSaveFailed {
                path: target.to_path_buf(),
                reason: format!("stale holder {holder:?} present; run recovery first"),
            });
        }
        if let Some(parent) = target.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        let moved = if target.exists() {
            fs::rename(target, &holder)?;
            Some(holder)
        } else {
            None
        };
        let swap = Self {
            target: target.to_path_buf(),
            holder: moved,
            armed: true,
        };
        fs::create_dir(target)?;
        Ok(swap)
    }

    pub(crate) fn had_previous(&self) -> bool {
        self.holder.is_some()
    }

    /// Keep the new `D` and delete the holder. Holder removal is best-effort.
    pub(crate) fn commit(mut self) {
        self.armed = false;
        if let Some(holder) = self.holder.take() {
            if let Err(e) = fs::remove_dir_all(&holder) {
                obs::emit_cleanup_failed(&holder, &e);
            }
        }
    }

    /// Restore the previous `D`, reporting any failure to do so.
    pub(crate) fn rollback(mut self) -> io::Result<()> {
        self.armed = false;
        self.restore()
    }

    fn restore(&mut self) -> io::Result<()> {
        if self.target.exists() {
            fs::remove_dir_all(&self.target)?;
        }
        if let Some(holder) = self.holder.take() {
            fs::rename(&holder, &self.target)?;
        }
        Ok(())
    }
}

impl Drop for Swap {
    fn drop(&mut self) {
        if self.armed {
            self.armed = false;
            if let Err(e) = self.restore() {
                tracing::error!(
                    target = %self.target.display(),
                    error = %e,
                    "failed to restore artifact after interrupted swap"
                );
            }
        }
    }
}
