//! Tracing setup shared by both binaries.
//!
//! Events go to stdout and to a size-rotated log file. `RUST_LOG` overrides
//! the configured level.

use cammy_config::LogConfig;
use file_rotate::compression::Compression;
use file_rotate::suffix::AppendCount;
use file_rotate::{ContentLimit, FileRotate};
use std::fs::{self, OpenOptions};
use std::io;
use std::path::PathBuf;
use std::sync::Mutex;
use thiserror::Error;
use tracing::error;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Debug, Error)]
pub enum LoggingError {
    #[error("Cannot open log file {path}: {source}")]
    Open { path: PathBuf, source: io::Error },

    #[error("Invalid log filter: {0}")]
    Filter(String),

    #[error("Failed to install subscriber: {0}")]
    Init(String),
}

/// Open the rotating writer for `config.path`, creating parent directories.
pub fn open_log_writer(config: &LogConfig) -> Result<FileRotate<AppendCount>, LoggingError> {
    let open_err = |source| LoggingError::Open {
        path: config.path.clone(),
        source,
    };

    if let Some(parent) = config.path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(open_err)?;
    }
    // FileRotate does not report open errors
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(&config.path)
        .map_err(open_err)?;

    let limit = ContentLimit::Bytes(config.max_bytes);

    #[cfg(unix)]
    let writer = FileRotate::new(
        &config.path,
        AppendCount::new(config.backups),
        limit,
        Compression::None,
        None,
    );
    #[cfg(not(unix))]
    let writer = FileRotate::new(
        &config.path,
        AppendCount::new(config.backups),
        limit,
        Compression::None,
    );

    Ok(writer)
}

/// Install the global subscriber.
pub fn init(config: &LogConfig) -> Result<(), LoggingError> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(&config.level)
            .map_err(|e| LoggingError::Filter(e.to_string()))?,
    };

    let writer = open_log_writer(config)?;

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false))
        .with(
            fmt::layer()
                .with_target(false)
                .with_ansi(false)
                .with_writer(Mutex::new(writer)),
        )
        .try_init()
        .map_err(|e| LoggingError::Init(e.to_string()))
}

/// Route panics through tracing so they land in the log file.
pub fn install_panic_hook() {
    let default_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        error!(panic = %info, "Unhandled panic");
        default_hook(info);
    }));
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    #[test]
    fn test_writer_rotates_by_size() {
        let temp_dir = TempDir::new().unwrap();
        let mut config = LogConfig::new(temp_dir.path().join("logs").join("cammyput.log"));
        config.max_bytes = 16;
        config.backups = 2;

        let mut writer = open_log_writer(&config).unwrap();
        for _ in 0..4 {
            writer.write_all(b"0123456789abcdef").unwrap();
        }
        writer.flush().unwrap();

        assert!(config.path.exists());
        assert!(temp_dir.path().join("logs").join("cammyput.log.1").exists());
        assert!(!temp_dir.path().join("logs").join("cammyput.log.3").exists());
    }

    #[test]
    fn test_unwritable_path_is_an_error() {
        let temp_dir = TempDir::new().unwrap();
        let blocker = temp_dir.path().join("file");
        fs::write(&blocker, b"x").unwrap();

        let config = LogConfig::new(blocker.join("cammyput.log"));
        assert!(matches!(
            open_log_writer(&config),
            Err(LoggingError::Open { .. })
        ));
    }
}
