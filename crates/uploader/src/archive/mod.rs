//! Local archive of captured frames.
//!
//! Two retention policies are supported:
//! - [`FlatArchive`]: every frame directly under the root, capped by total size
//! - [`BucketedArchive`]: frames under `<YYYYMMDD>/<HH>/`, capped by day count

pub mod bucketed;
pub mod flat;

pub use bucketed::{BucketReport, BucketedArchive};
pub use flat::{check_ceiling, CeilingCheck, FlatArchive, FlatReport};

use crate::catalog::CatalogError;
use cammy_config::{ArchiveConfig, ArchivePolicy};
use std::path::{Path, PathBuf};
use thiserror::Error;
use walkdir::WalkDir;

#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("Archive I/O failed on {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error(transparent)]
    Catalog(#[from] CatalogError),
}

impl ArchiveError {
    pub(crate) fn io(path: &Path, source: std::io::Error) -> Self {
        ArchiveError::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Splits a `<YYYYMMDD>_<HH>...` name into its date and hour tokens.
///
/// Returns `None` for names that do not follow the convention.
pub fn parse_timestamp_tokens(filename: &str) -> Option<(&str, &str)> {
    let (date, rest) = filename.split_once('_')?;
    date_hour(date, rest)
}

/// Validates an 8-digit date token and takes the 2-digit hour from the
/// start of `time`.
pub fn date_hour<'a>(date: &'a str, time: &'a str) -> Option<(&'a str, &'a str)> {
    if date.len() != 8 || !date.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let hour = time.get(..2)?;
    if !hour.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    Some((date, hour))
}

/// Total size in bytes of all files below `root`. Unreadable entries count as zero.
pub fn dir_size(root: &Path) -> u64 {
    WalkDir::new(root)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .filter_map(|e| e.metadata().ok())
        .map(|m| m.len())
        .sum()
}

/// The configured archive, whichever policy it uses.
#[derive(Debug, Clone)]
pub enum ArchiveStore {
    Flat(FlatArchive),
    Bucketed(BucketedArchive),
}

/// Result of one archiving pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArchiveReport {
    Flat(FlatReport),
    Bucketed(BucketReport),
}

impl ArchiveReport {
    /// Number of frames copied into the archive.
    pub fn archived(&self) -> usize {
        match self {
            ArchiveReport::Flat(r) => r.archived,
            ArchiveReport::Bucketed(r) => r.archived,
        }
    }
}

impl ArchiveStore {
    pub fn from_config(config: &ArchiveConfig) -> Self {
        match config.policy {
            ArchivePolicy::Flat { ceiling_bytes } => {
                ArchiveStore::Flat(FlatArchive::new(&config.dir, ceiling_bytes))
            }
            ArchivePolicy::Bucketed { retain_days } => {
                ArchiveStore::Bucketed(BucketedArchive::new(&config.dir, retain_days))
            }
        }
    }

    /// Archive every eligible frame in `source_dir` under this store's policy.
    pub fn archive_all(&self, source_dir: &Path) -> Result<ArchiveReport, ArchiveError> {
        match self {
            ArchiveStore::Flat(archive) => archive.archive_all(source_dir).map(ArchiveReport::Flat),
            ArchiveStore::Bucketed(archive) => {
                archive.archive_all(source_dir).map(ArchiveReport::Bucketed)
            }
        }
    }
}
