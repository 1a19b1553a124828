//! Catalog of frames waiting in the capture directory.
//!
//! The camera names frames with a timestamp prefix, so lexicographic order of
//! the listing is also capture order.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use thiserror::Error;

/// Suffix that marks a downsampled derivative of a capture.
pub const DERIVED_SUFFIX: &str = "_sml.jpg";

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("Failed to read directory {path}: {source}")]
    ReadDir {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Lists the regular files in `dir`, sorted ascending by name.
///
/// Subdirectories and names that are not valid UTF-8 are left out.
pub fn list_images(dir: &Path) -> Result<Vec<String>, CatalogError> {
    let read_err = |source| CatalogError::ReadDir {
        path: dir.to_path_buf(),
        source,
    };

    let mut names = Vec::new();
    for entry in fs::read_dir(dir).map_err(read_err)? {
        let entry = entry.map_err(read_err)?;
        // Entries can vanish between readdir and stat
        let Ok(file_type) = entry.file_type() else {
            continue;
        };
        if file_type.is_dir() {
            continue;
        }
        if let Ok(name) = entry.file_name().into_string() {
            names.push(name);
        }
    }

    names.sort();
    Ok(names)
}

/// Checks if a file is a resize derivative.
pub fn is_derived(filename: &str) -> bool {
    filename.ends_with(DERIVED_SUFFIX)
}

/// Time since the file was created. Zero if the file cannot be stat'ed.
pub fn file_age(dir: &Path, filename: &str) -> Duration {
    file_age_at(dir, filename, SystemTime::now())
}

/// Same as [`file_age`], measured against `now`.
///
/// Uses the creation time where the platform reports one and the
/// modification time otherwise. A timestamp after `now` counts as zero.
pub fn file_age_at(dir: &Path, filename: &str, now: SystemTime) -> Duration {
    let Ok(metadata) = fs::metadata(dir.join(filename)) else {
        return Duration::ZERO;
    };

    let created = metadata
        .created()
        .or_else(|_| metadata.modified())
        .unwrap_or(now);

    now.duration_since(created).unwrap_or(Duration::ZERO)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::collections::BTreeSet;
    use std::fs::File;
    use tempfile::TempDir;

    #[test]
    fn test_is_derived() {
        assert!(is_derived("20240101_100000_01_sml.jpg"));
        assert!(is_derived("a_sml.jpg"));
        assert!(!is_derived("a.jpg"));
        assert!(!is_derived("a_sml.png"));
        assert!(!is_derived("a_SML.jpg"));
    }

    #[test]
    fn test_list_images_sorted_and_files_only() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();

        File::create(root.join("20240101_110000_01.jpg")).unwrap();
        File::create(root.join("20240101_100000_01.jpg")).unwrap();
        File::create(root.join("20231231_235959_01.jpg")).unwrap();
        fs::create_dir(root.join("subdir")).unwrap();

        let names = list_images(root).unwrap();
        assert_eq!(
            names,
            vec![
                "20231231_235959_01.jpg",
                "20240101_100000_01.jpg",
                "20240101_110000_01.jpg",
            ]
        );
    }

    #[test]
    fn test_list_images_missing_dir() {
        let temp_dir = TempDir::new().unwrap();
        let result = list_images(&temp_dir.path().join("missing"));
        assert!(matches!(result, Err(CatalogError::ReadDir { .. })));
    }

    #[test]
    fn test_age_of_missing_file_is_zero() {
        let temp_dir = TempDir::new().unwrap();
        assert_eq!(file_age(temp_dir.path(), "gone.jpg"), Duration::ZERO);
    }

    #[test]
    fn test_age_measured_against_now() {
        let temp_dir = TempDir::new().unwrap();
        File::create(temp_dir.path().join("a.jpg")).unwrap();

        let later = SystemTime::now() + Duration::from_secs(7200);
        let age = file_age_at(temp_dir.path(), "a.jpg", later);
        assert!(age >= Duration::from_secs(7199), "age was {:?}", age);

        let earlier = SystemTime::now() - Duration::from_secs(3600);
        assert_eq!(file_age_at(temp_dir.path(), "a.jpg", earlier), Duration::ZERO);
    }

    // Listing is sorted ascending and stable across repeated calls.
    proptest! {
        #![proptest_config(ProptestConfig::with_cases(50))]

        #[test]
        fn prop_listing_sorted_and_stable(
            names in proptest::collection::btree_set("[a-zA-Z0-9_]{1,16}\\.jpg", 0..20),
        ) {
            let temp_dir = TempDir::new().unwrap();
            for name in &names {
                File::create(temp_dir.path().join(name)).unwrap();
            }

            let first = list_images(temp_dir.path()).unwrap();
            let second = list_images(temp_dir.path()).unwrap();

            let expected: Vec<String> = names.iter().cloned().collect::<BTreeSet<_>>().into_iter().collect();
            prop_assert_eq!(&first, &expected);
            prop_assert_eq!(first, second);
        }
    }
}
