//! Flat, size-capped archive.
//!
//! Frames live directly under the archive root. The running size is tracked
//! by the caller and entries are evicted in name order, which for
//! timestamp-prefixed names is oldest first.

use super::{dir_size, ArchiveError};
use crate::catalog::{is_derived, list_images};
use std::fs::{self, File};
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Result of comparing the tracked archive size against its ceiling
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CeilingCheck {
    /// Size is at or below the ceiling
    Within,
    /// Size exceeds the ceiling
    Over { size: u64, ceiling: u64 },
}

/// Check the tracked archive size against the ceiling.
///
/// Returns `Over` if `size > ceiling`, otherwise `Within`.
pub fn check_ceiling(size: u64, ceiling: u64) -> CeilingCheck {
    if size > ceiling {
        CeilingCheck::Over { size, ceiling }
    } else {
        CeilingCheck::Within
    }
}

/// What happened to a single frame offered to the archive
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Admission {
    AlreadyPresent,
    Archived { evicted: usize },
    /// The frame cannot fit even in an empty archive
    TooLarge,
}

/// Counters for one `archive_all` run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FlatReport {
    pub archived: usize,
    pub skipped_existing: usize,
    pub skipped_oversize: usize,
    pub evicted: usize,
    pub failures: usize,
    /// Tracked archive size after the run
    pub size: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlatArchive {
    root: PathBuf,
    ceiling: u64,
}

impl FlatArchive {
    pub fn new(root: impl Into<PathBuf>, ceiling: u64) -> Self {
        Self {
            root: root.into(),
            ceiling,
        }
    }

    pub fn ceiling(&self) -> u64 {
        self.ceiling
    }

    /// Size of the archive as found on disk.
    pub fn current_size(&self) -> u64 {
        dir_size(&self.root)
    }

    /// Copies `filename` into the archive unless it is already there.
    ///
    /// Entries are evicted in name order until the new frame fits under the
    /// ceiling. Returns the updated tracked size; an existing entry returns
    /// `current_size` unchanged.
    pub fn ensure_archived(
        &self,
        source_dir: &Path,
        filename: &str,
        current_size: u64,
    ) -> Result<u64, ArchiveError> {
        self.admit(source_dir, filename, current_size)
            .map(|(_, size)| size)
    }

    /// Archives every non-derivative frame in `source_dir`, in catalog order.
    ///
    /// The starting size is measured once by walking the archive; from there
    /// on it is a running counter. A frame that fails to copy is logged and
    /// the run continues.
    pub fn archive_all(&self, source_dir: &Path) -> Result<FlatReport, ArchiveError> {
        fs::create_dir_all(&self.root).map_err(|e| ArchiveError::io(&self.root, e))?;

        let mut report = FlatReport {
            size: self.current_size(),
            ..FlatReport::default()
        };

        for name in list_images(source_dir)? {
            if is_derived(&name) {
                continue;
            }
            match self.admit(source_dir, &name, report.size) {
                Ok((Admission::AlreadyPresent, _)) => report.skipped_existing += 1,
                Ok((Admission::TooLarge, _)) => report.skipped_oversize += 1,
                Ok((Admission::Archived { evicted }, size)) => {
                    report.archived += 1;
                    report.evicted += evicted;
                    report.size = size;
                }
                Err(e) => {
                    warn!(file = %name, error = %e, "Archiving failed");
                    report.failures += 1;
                }
            }
        }

        Ok(report)
    }

    fn admit(
        &self,
        source_dir: &Path,
        filename: &str,
        current_size: u64,
    ) -> Result<(Admission, u64), ArchiveError> {
        let target = self.root.join(filename);
        if target.exists() {
            info!(target = %target.display(), "Target file already exists. Skipping");
            return Ok((Admission::AlreadyPresent, current_size));
        }

        let source = source_dir.join(filename);
        let incoming = fs::metadata(&source)
            .map_err(|e| ArchiveError::io(&source, e))?
            .len();
        if incoming > self.ceiling {
            warn!(
                file = %filename,
                bytes = incoming,
                ceiling = self.ceiling,
                "Frame larger than the archive ceiling. Skipping"
            );
            return Ok((Admission::TooLarge, current_size));
        }

        let mut size = current_size;
        let mut evicted = 0;
        while let CeilingCheck::Over { .. } =
            check_ceiling(size.saturating_add(incoming), self.ceiling)
        {
            match self.evict_oldest()? {
                Some(freed) => {
                    size = size.saturating_sub(freed);
                    evicted += 1;
                }
                None => {
                    // Tracked size drifted from what is on disk
                    warn!(
                        archive = %self.root.display(),
                        tracked = size,
                        "Archive has no files left to evict. Resetting tracked size"
                    );
                    size = 0;
                }
            }
        }

        info!(file = %filename, dirsize = size, "Archiving");
        let mut reader = File::open(&source).map_err(|e| ArchiveError::io(&source, e))?;
        let copied = write_entry(&mut reader, &target).map_err(|e| ArchiveError::io(&target, e))?;
        Ok((Admission::Archived { evicted }, size + copied))
    }

    /// Removes the smallest-named file in the archive and returns its size.
    fn evict_oldest(&self) -> Result<Option<u64>, ArchiveError> {
        let Some(oldest) = list_images(&self.root)?.into_iter().next() else {
            return Ok(None);
        };

        let path = self.root.join(&oldest);
        let freed = fs::metadata(&path).map(|m| m.len()).unwrap_or(0);
        info!(file = %path.display(), bytes = freed, "Spring cleaning");
        fs::remove_file(&path).map_err(|e| ArchiveError::io(&path, e))?;
        Ok(Some(freed))
    }
}

/// Streams `reader` into a new file at `target`. No partial file is left
/// behind on failure.
fn write_entry(reader: &mut dyn Read, target: &Path) -> io::Result<u64> {
    let result = File::create(target).and_then(|mut out| io::copy(reader, &mut out));
    if result.is_err() {
        let _ = fs::remove_file(target);
    }
    result
}
