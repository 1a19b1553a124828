//! Single-instance guard backed by an advisory file lock.
//!
//! The lock is tied to the open handle, not to the file's existence: a lock
//! file left behind by a killed process does not block the next run.

use fs4::FileExt;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

/// Errors other than contention. Contention is reported as `Ok(None)`.
#[derive(Debug, Error)]
pub enum LockError {
    #[error("Failed to open lock file {path}: {source}")]
    Open { path: PathBuf, source: io::Error },

    #[error("Failed to write pid to lock file {path}: {source}")]
    Write { path: PathBuf, source: io::Error },

    #[error("Failed to remove lock file {path}: {source}")]
    Remove { path: PathBuf, source: io::Error },
}

/// Held exclusive lock on the pid file.
///
/// Dropping the guard unlocks but leaves the file in place; `release` also
/// deletes it.
#[derive(Debug)]
pub struct InstanceGuard {
    file: File,
    path: PathBuf,
}

impl InstanceGuard {
    /// Try to become the single running instance.
    ///
    /// Returns `Ok(None)` when another process holds the lock. On success the
    /// file holds the current process id.
    pub fn acquire(path: &Path) -> Result<Option<Self>, LockError> {
        let mut file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .truncate(false)
            .open(path)
            .map_err(|source| LockError::Open {
                path: path.to_path_buf(),
                source,
            })?;

        if let Err(e) = file.try_lock_exclusive() {
            debug!(path = %path.display(), error = %e, "Lock held elsewhere");
            return Ok(None);
        }

        // Truncate only while holding the lock
        let write_pid = |file: &mut File| -> io::Result<()> {
            file.set_len(0)?;
            writeln!(file, "{}", std::process::id())?;
            file.flush()
        };
        write_pid(&mut file).map_err(|source| LockError::Write {
            path: path.to_path_buf(),
            source,
        })?;

        Ok(Some(Self {
            file,
            path: path.to_path_buf(),
        }))
    }

    /// Delete the lock file and drop the lock.
    pub fn release(self) -> Result<(), LockError> {
        let Self { file, path } = self;
        // Unlink before unlocking.
        let removed = fs::remove_file(&path);
        drop(file);
        removed.map_err(|source| LockError::Remove { path, source })
    }
}
