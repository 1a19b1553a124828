//! Organizer for the FTP landing directory.
//!
//! Cameras upload alarm clips as `<camera>/record/<X>Dalarm_<YYYYMMDD>_<HHMMSS>.<ext>`.
//! [`organize`] moves them into `<camera>/record/<YYYYMMDD>/<HH>/` and
//! [`cleanup`] keeps only the newest day directories per camera.

use crate::archive::date_hour;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{info, warn};

/// Directory under each camera that holds its clips.
pub const RECORD_DIR: &str = "record";

/// Prefix of alarm clips, after the one-character stream tag.
pub const ALARM_PREFIX: &str = "Dalarm_";

#[derive(Debug, Error)]
pub enum OrganizerError {
    #[error("Failed to read {path}: {source}")]
    ReadDir { path: PathBuf, source: io::Error },
}

/// Counters for one `organize` run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OrganizeReport {
    pub cameras: usize,
    pub moved: usize,
    pub skipped_existing: usize,
    /// Entries that are not alarm clips
    pub ignored: usize,
    pub failures: usize,
}

/// Date and hour of an alarm clip, or `None` for anything else.
pub fn parse_movie_name(name: &str) -> Option<(&str, &str)> {
    let (tag_len, _) = name.char_indices().nth(1)?;
    if !name[tag_len..].starts_with(ALARM_PREFIX) {
        return None;
    }

    let mut tokens = name.split('_');
    tokens.next()?;
    let date = tokens.next()?;
    let time = tokens.next()?;
    date_hour(date, time)
}

fn read_dir_names(path: &Path, dirs_only: bool) -> Result<Vec<String>, OrganizerError> {
    let entries = fs::read_dir(path).map_err(|source| OrganizerError::ReadDir {
        path: path.to_path_buf(),
        source,
    })?;

    Ok(entries
        .filter_map(|e| e.ok())
        .filter(|e| !dirs_only || e.file_type().map(|t| t.is_dir()).unwrap_or(false))
        .filter_map(|e| e.file_name().into_string().ok())
        .collect())
}

/// Record directories of every camera under `target`, with the camera name.
fn camera_records(target: &Path) -> Result<Vec<(String, PathBuf)>, OrganizerError> {
    let mut cameras = read_dir_names(target, true)?;
    cameras.sort();

    Ok(cameras
        .into_iter()
        .filter_map(|camera| {
            let record = target.join(&camera).join(RECORD_DIR);
            if record.is_dir() {
                Some((camera, record))
            } else {
                warn!(camera = %camera, "Camera has no record directory. Skipping");
                None
            }
        })
        .collect())
}

/// Moves a file, falling back to copy and delete across filesystems.
fn move_file(from: &Path, to: &Path) -> io::Result<()> {
    if fs::rename(from, to).is_ok() {
        return Ok(());
    }
    fs::copy(from, to)?;
    fs::remove_file(from)
}

/// Moves every alarm clip into its `<date>/<hour>` directory.
///
/// In dry-run mode the actions are only logged. A clip that fails to move
/// is logged and the rest of the batch continues.
pub fn organize(target: &Path, dry_run: bool) -> Result<OrganizeReport, OrganizerError> {
    let mut report = OrganizeReport::default();

    for (camera, record) in camera_records(target)? {
        info!(camera = %camera, "Processing camera");
        report.cameras += 1;

        let mut movies = read_dir_names(&record, false)?;
        movies.sort();

        for movie in movies {
            let source = record.join(&movie);
            let Some((date, hour)) = parse_movie_name(&movie).filter(|_| source.is_file()) else {
                report.ignored += 1;
                continue;
            };

            let new_dir = record.join(date).join(hour);
            let dest = new_dir.join(&movie);
            info!(movie = %movie, dest = %new_dir.display(), "Moving file");

            if dest.exists() {
                warn!(dest = %dest.display(), "Destination already exists. Skipping");
                report.skipped_existing += 1;
                continue;
            }

            if dry_run {
                info!("DRY-RUN. Moving file skipped");
                report.moved += 1;
                continue;
            }

            let moved = fs::create_dir_all(&new_dir).and_then(|_| move_file(&source, &dest));
            match moved {
                Ok(()) => report.moved += 1,
                Err(e) => {
                    warn!(movie = %movie, error = %e, "Failed to move file");
                    report.failures += 1;
                }
            }
        }
    }

    Ok(report)
}

/// Removes all but the newest `keep_days` day directories of every camera.
///
/// Only directories named as an 8-digit date count as days. Removal is
/// best-effort; returns the number of day directories removed (or that would
/// be removed, in dry-run mode).
pub fn cleanup(target: &Path, keep_days: usize, dry_run: bool) -> Result<usize, OrganizerError> {
    info!(keep_days, "Cleaning old movies");
    let mut removed = 0;

    for (camera, record) in camera_records(target)? {
        info!(camera = %camera, "Cleanup of camera");

        let mut days: Vec<String> = read_dir_names(&record, true)?
            .into_iter()
            .filter(|d| d.len() == 8 && d.bytes().all(|b| b.is_ascii_digit()))
            .collect();
        days.sort_by(|a, b| b.cmp(a));

        for day in days.iter().skip(keep_days) {
            let path = record.join(day);
            info!(day = %path.display(), "Removing");
            if dry_run {
                info!("DRY-RUN. Skipped");
                removed += 1;
                continue;
            }
            match fs::remove_dir_all(&path) {
                Ok(()) => removed += 1,
                Err(e) => warn!(day = %path.display(), error = %e, "Failed to remove day"),
            }
        }
    }

    info!(removed, "Cleaning done");
    Ok(removed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn landing() -> TempDir {
        let temp_dir = TempDir::new().unwrap();
        let record = temp_dir.path().join("cam01").join(RECORD_DIR);
        fs::create_dir_all(&record).unwrap();
        fs::write(record.join("MDalarm_20240101_103000.mkv"), b"m").unwrap();
        fs::write(record.join("SDalarm_20240101_233000.mkv"), b"s").unwrap();
        fs::write(record.join("MDalarm_20240102_000500.mkv"), b"n").unwrap();
        fs::write(record.join("notes.txt"), b"x").unwrap();
        fs::write(record.join("MDalarm_bad.mkv"), b"x").unwrap();
        temp_dir
    }

    #[test]
    fn test_parse_movie_name() {
        assert_eq!(
            parse_movie_name("MDalarm_20240101_103000.mkv"),
            Some(("20240101", "10"))
        );
        assert_eq!(
            parse_movie_name("SDalarm_20231231_235959.mkv"),
            Some(("20231231", "23"))
        );
        assert_eq!(parse_movie_name("Dalarm_20240101_103000.mkv"), None);
        assert_eq!(parse_movie_name("MDalarm_bad.mkv"), None);
        assert_eq!(parse_movie_name("20240101_103000.jpg"), None);
        assert_eq!(parse_movie_name(""), None);
    }

    #[test]
    fn test_organize_moves_into_date_hour() {
        let temp_dir = landing();
        let record = temp_dir.path().join("cam01").join(RECORD_DIR);

        let report = organize(temp_dir.path(), false).unwrap();

        assert_eq!(report.cameras, 1);
        assert_eq!(report.moved, 3);
        assert_eq!(report.ignored, 2);
        assert!(record.join("20240101/10/MDalarm_20240101_103000.mkv").exists());
        assert!(record.join("20240101/23/SDalarm_20240101_233000.mkv").exists());
        assert!(record.join("20240102/00/MDalarm_20240102_000500.mkv").exists());
        assert!(!record.join("MDalarm_20240101_103000.mkv").exists());
        assert!(record.join("notes.txt").exists());
        assert!(record.join("MDalarm_bad.mkv").exists());
    }

    #[test]
    fn test_organize_dry_run_touches_nothing() {
        let temp_dir = landing();
        let record = temp_dir.path().join("cam01").join(RECORD_DIR);

        let report = organize(temp_dir.path(), true).unwrap();

        assert_eq!(report.moved, 3);
        assert!(record.join("MDalarm_20240101_103000.mkv").exists());
        assert!(!record.join("20240101").exists());
    }

    #[test]
    fn test_organize_skips_camera_without_record() {
        let temp_dir = landing();
        fs::create_dir_all(temp_dir.path().join("cam02")).unwrap();

        let report = organize(temp_dir.path(), false).unwrap();
        assert_eq!(report.cameras, 1);
    }

    #[test]
    fn test_cleanup_keeps_newest_days() {
        let temp_dir = landing();
        let record = temp_dir.path().join("cam01").join(RECORD_DIR);
        organize(temp_dir.path(), false).unwrap();
        fs::create_dir_all(record.join("20231230/08")).unwrap();

        let removed = cleanup(temp_dir.path(), 2, false).unwrap();

        assert_eq!(removed, 1);
        assert!(record.join("20240102").is_dir());
        assert!(record.join("20240101").is_dir());
        assert!(!record.join("20231230").exists());
        // Unorganized files are not days
        assert!(record.join("notes.txt").exists());
    }

    #[test]
    fn test_cleanup_dry_run() {
        let temp_dir = landing();
        let record = temp_dir.path().join("cam01").join(RECORD_DIR);
        organize(temp_dir.path(), false).unwrap();

        let removed = cleanup(temp_dir.path(), 1, true).unwrap();
        assert_eq!(removed, 1);
        assert!(record.join("20240101").is_dir());
    }

    #[test]
    fn test_missing_target_is_an_error() {
        let temp_dir = TempDir::new().unwrap();
        let result = organize(&temp_dir.path().join("missing"), false);
        assert!(matches!(result, Err(OrganizerError::ReadDir { .. })));
    }
}
