//! Run document storage (`<runDir>/run.json`) and advisory file locks.

use std::fs::{self, File, OpenOptions};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use fs2::FileExt;
use tracing::{debug, warn};

use crate::core::types::Run;

/// Load a run document.
///
/// Returns `None` when the file is missing or cannot be parsed; callers treat
/// both as "no such run".
pub fn read_run(path: &Path) -> Option<Run> {
    let contents = match fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(err) => {
            if err.kind() != ErrorKind::NotFound {
                warn!(path = %path.display(), err = %err, "failed to read run document");
            }
            return None;
        }
    };
    match serde_json::from_str(&contents) {
        Ok(run) => Some(run),
        Err(err) => {
            warn!(path = %path.display(), err = %err, "ignoring unparsable run document");
            None
        }
    }
}

/// Atomically write the whole run document (temp file + rename).
///
/// The run directory must already exist; a removed run is never recreated.
pub fn write_run(path: &Path, run: &Run) -> Result<()> {
    debug!(path = %path.display(), id = %run.id, status = run.status.as_str(), "writing run");
    let mut buf = serde_json::to_string_pretty(run).context("serialize run")?;
    buf.push('\n');
    write_atomic(path, &buf)
}

pub(crate) fn write_atomic(path: &Path, contents: &str) -> Result<()> {
    let parent = path
        .parent()
        .with_context(|| format!("path missing parent {}", path.display()))?;
    let mut tmp_name = path.file_name().unwrap_or_default().to_os_string();
    tmp_name.push(".tmp");
    let tmp_path = parent.join(tmp_name);
    fs::write(&tmp_path, contents)
        .with_context(|| format!("write temp file {}", tmp_path.display()))?;
    fs::rename(&tmp_path, path).with_context(|| format!("replace {}", path.display()))?;
    Ok(())
}

/// Exclusive advisory lock on a file; released when dropped.
#[derive(Debug)]
pub struct FileLock {
    file: File,
    path: PathBuf,
}

impl FileLock {
    /// Block until the lock at `path` is held, creating the file (but not
    /// its directory) if needed.
    pub fn acquire(path: &Path) -> Result<Self> {
        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .truncate(false)
            .open(path)
            .with_context(|| format!("open lock {}", path.display()))?;
        file.lock_exclusive()
            .with_context(|| format!("lock {}", path.display()))?;
        debug!(path = %path.display(), "lock acquired");
        Ok(Self {
            file,
            path: path.to_path_buf(),
        })
    }
}

impl Drop for FileLock {
    fn drop(&mut self) {
        if let Err(err) = FileExt::unlock(&self.file) {
            warn!(path = %self.path.display(), err = %err, "failed to release lock");
        }
    }
}
