//! Day/hour bucketed archive with day-count retention.
//!
//! Layout: `<root>/<YYYYMMDD>/<HH>/<frame>.jpg`. Old day buckets are pruned
//! before anything new is archived.

use super::{parse_timestamp_tokens, ArchiveError};
use crate::catalog::{is_derived, list_images};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Counters for one `archive_all` run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BucketReport {
    /// Day buckets removed by retention
    pub pruned: usize,
    /// Day buckets that could not be removed
    pub prune_failures: usize,
    pub archived: usize,
    pub skipped_existing: usize,
    /// Frames whose names carry no date/hour tokens
    pub skipped_malformed: usize,
    /// Frames that failed to copy
    pub failures: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BucketedArchive {
    root: PathBuf,
    retain_days: usize,
}

/// Directory a frame belongs in, or `None` for names outside the convention.
pub fn bucket_dir(root: &Path, filename: &str) -> Option<PathBuf> {
    let (date, hour) = parse_timestamp_tokens(filename)?;
    Some(root.join(date).join(hour))
}

impl BucketedArchive {
    pub fn new(root: impl Into<PathBuf>, retain_days: usize) -> Self {
        Self {
            root: root.into(),
            retain_days,
        }
    }

    pub fn retain_days(&self) -> usize {
        self.retain_days
    }

    /// Day bucket names under the root, newest first.
    pub fn day_buckets(&self) -> Result<Vec<String>, ArchiveError> {
        let entries = fs::read_dir(&self.root).map_err(|e| ArchiveError::io(&self.root, e))?;

        let mut buckets: Vec<String> = entries
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().map(|t| t.is_dir()).unwrap_or(false))
            .filter_map(|e| e.file_name().into_string().ok())
            .collect();

        buckets.sort_by(|a, b| b.cmp(a));
        Ok(buckets)
    }

    /// Removes every day bucket beyond the newest `retain_days`.
    ///
    /// Returns `(removed, failed)`. A bucket that cannot be removed is logged
    /// and the rest are still attempted.
    pub fn prune(&self) -> Result<(usize, usize), ArchiveError> {
        let mut removed = 0;
        let mut failed = 0;

        for bucket in self.day_buckets()?.iter().skip(self.retain_days) {
            let path = self.root.join(bucket);
            info!(bucket = %path.display(), "Removing old archive day");
            match fs::remove_dir_all(&path) {
                Ok(()) => removed += 1,
                Err(e) => {
                    warn!(bucket = %path.display(), error = %e, "Failed to remove archive day");
                    failed += 1;
                }
            }
        }

        Ok((removed, failed))
    }

    /// Prunes old buckets, then copies every `.jpg` non-derivative frame of
    /// `source_dir` into its `<date>/<hour>` bucket.
    ///
    /// Frames already archived and frames with malformed names are skipped;
    /// neither aborts the batch.
    pub fn archive_all(&self, source_dir: &Path) -> Result<BucketReport, ArchiveError> {
        fs::create_dir_all(&self.root).map_err(|e| ArchiveError::io(&self.root, e))?;

        let (pruned, prune_failures) = self.prune()?;
        let mut report = BucketReport {
            pruned,
            prune_failures,
            ..BucketReport::default()
        };

        for name in list_images(source_dir)? {
            if !name.ends_with(".jpg") || is_derived(&name) {
                continue;
            }

            let Some(dest_dir) = bucket_dir(&self.root, &name) else {
                debug!(file = %name, "No date/hour in file name. Skipping");
                report.skipped_malformed += 1;
                continue;
            };

            let target = dest_dir.join(&name);
            if target.exists() {
                warn!(target = %target.display(), "Target file already exists. Skipping");
                report.skipped_existing += 1;
                continue;
            }

            if let Err(e) = fs::create_dir_all(&dest_dir) {
                warn!(dir = %dest_dir.display(), error = %e, "Failed to create archive directory");
                report.failures += 1;
                continue;
            }

            match fs::copy(source_dir.join(&name), &target) {
                Ok(bytes) => {
                    info!(file = %name, dest = %dest_dir.display(), bytes, "Archived");
                    report.archived += 1;
                }
                Err(e) => {
                    warn!(file = %name, error = %e, "Archiving failed");
                    report.failures += 1;
                }
            }
        }

        Ok(report)
    }
}
