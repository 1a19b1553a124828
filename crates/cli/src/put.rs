//! CLI entry point for CammyPut
//!
//! Uploads captured frames to the Cammy FTP endpoint.

use cammy_config::{
    ArchiveConfig, ArchivePolicy, LogConfig, RemoteConfig, ResizeConfig, UploaderConfig,
};
use cammy_uploader::{logging, FtpConnector, InstanceGuard, UploadPipeline};
use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{error, info, warn};

/// CammyPut - upload camera frames to Cammy
#[derive(Parser, Debug)]
#[command(name = "cammy-put")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Cammy FTP username
    #[arg(short, long, env = "CAMMY_USERNAME")]
    username: String,

    /// Cammy FTP password
    #[arg(short, long, env = "CAMMY_PASSWORD", hide_env_values = true)]
    password: String,

    /// Log file
    #[arg(long, default_value = "cammyput.log")]
    log: PathBuf,

    /// Directory with captured images
    #[arg(long, default_value = "images")]
    imagedir: PathBuf,

    /// Single-instance lock file
    #[arg(long, default_value = "/var/run/motion/cammyput.pid")]
    pidfile: PathBuf,

    /// Delete images after upload and drop frames older than an hour
    #[arg(long)]
    delete: bool,

    /// Upload a downsampled copy instead of the original
    #[arg(long)]
    resize: bool,

    /// Keep a local copy of every image in this directory
    #[arg(long)]
    archivedir: Option<PathBuf>,

    /// Archive into day/hour buckets, keeping this many days
    #[arg(long, requires = "archivedir")]
    archive_days: Option<usize>,

    /// Size ceiling of the flat archive in bytes
    #[arg(
        long,
        default_value_t = ArchivePolicy::DEFAULT_FLAT_CEILING,
        requires = "archivedir",
        conflicts_with = "archive_days"
    )]
    archive_max_bytes: u64,

    /// FTP host
    #[arg(long, default_value = "ftp.cammy.com")]
    host: String,

    /// FTP port
    #[arg(long, default_value_t = 10021)]
    port: u16,

    /// Stop after this many passes
    #[arg(long)]
    max_passes: Option<u32>,
}

impl Args {
    fn into_config(self) -> UploaderConfig {
        let mut remote = RemoteConfig::new(self.username, self.password);
        remote.host = self.host;
        remote.port = self.port;

        let archive = self.archivedir.map(|dir| ArchiveConfig {
            dir,
            policy: match self.archive_days {
                Some(retain_days) => ArchivePolicy::Bucketed { retain_days },
                None => ArchivePolicy::Flat {
                    ceiling_bytes: self.archive_max_bytes,
                },
            },
        });

        let mut config = UploaderConfig::new(self.imagedir, remote);
        config.pid_file = self.pidfile;
        config.log = LogConfig::new(self.log);
        config.delete = self.delete;
        config.resize = self.resize.then(ResizeConfig::default);
        config.archive = archive;
        config.max_passes = self.max_passes;
        config
    }
}

fn main() -> ExitCode {
    let config = Args::parse().into_config();

    if let Err(e) = logging::init(&config.log) {
        eprintln!("Failed to initialize logging: {}", e);
        return ExitCode::FAILURE;
    }
    logging::install_panic_hook();

    info!("CammyPut started");

    let guard = match InstanceGuard::acquire(&config.pid_file) {
        Ok(Some(guard)) => guard,
        Ok(None) => {
            warn!(pidfile = %config.pid_file.display(), "CammyPut already running");
            return ExitCode::SUCCESS;
        }
        Err(e) => {
            error!(error = %e, "Failed to take instance lock");
            return ExitCode::FAILURE;
        }
    };

    let connector = FtpConnector::new(config.remote.clone());
    let result = UploadPipeline::new(&config, connector).and_then(|mut pipeline| pipeline.run());

    if let Err(e) = guard.release() {
        warn!(error = %e, "Failed to remove lock file");
    }

    match result {
        Ok(summary) if summary.has_failures() => {
            warn!(
                passes = summary.passes,
                uploaded = summary.uploaded,
                failed = summary.failed,
                resize_failed = summary.resize_failed,
                "Finished with failures, leftover images stay for the next run"
            );
            ExitCode::SUCCESS
        }
        Ok(summary) => {
            info!(
                passes = summary.passes,
                uploaded = summary.uploaded,
                dropped = summary.dropped,
                vanished = summary.vanished,
                archived = summary.archived,
                "Finished"
            );
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!(error = %e, "CammyPut failed");
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(extra: &[&str]) -> UploaderConfig {
        let mut argv = vec!["cammy-put", "-u", "cam", "-p", "secret"];
        argv.extend_from_slice(extra);
        Args::try_parse_from(argv).unwrap().into_config()
    }

    #[test]
    fn test_defaults() {
        let config = parse(&[]);
        assert_eq!(config.image_dir, PathBuf::from("images"));
        assert_eq!(config.pid_file, PathBuf::from("/var/run/motion/cammyput.pid"));
        assert_eq!(config.log.path, PathBuf::from("cammyput.log"));
        assert_eq!(config.remote.address(), "ftp.cammy.com:10021");
        assert!(!config.delete);
        assert!(config.resize.is_none());
        assert!(config.archive.is_none());
    }

    #[test]
    fn test_flat_archive() {
        let config = parse(&["--archivedir", "/srv/archive", "--delete", "--resize"]);
        let archive = config.archive.unwrap();
        assert_eq!(
            archive.policy,
            ArchivePolicy::Flat {
                ceiling_bytes: ArchivePolicy::DEFAULT_FLAT_CEILING
            }
        );
        assert!(config.delete);
        assert_eq!(config.resize, Some(ResizeConfig::default()));
    }

    #[test]
    fn test_bucketed_archive() {
        let config = parse(&["--archivedir", "/srv/archive", "--archive-days", "5"]);
        assert_eq!(
            config.archive.unwrap().policy,
            ArchivePolicy::Bucketed { retain_days: 5 }
        );
    }

    #[test]
    fn test_archive_days_needs_dir() {
        let argv = ["cammy-put", "-u", "cam", "-p", "secret", "--archive-days", "5"];
        assert!(Args::try_parse_from(argv).is_err());
    }

    #[test]
    fn test_archive_max_bytes_needs_dir() {
        let argv = ["cammy-put", "-u", "cam", "-p", "secret", "--archive-max-bytes", "1024"];
        assert!(Args::try_parse_from(argv).is_err());

        let config = parse(&["--archivedir", "/srv/archive", "--archive-max-bytes", "1024"]);
        assert_eq!(
            config.archive.unwrap().policy,
            ArchivePolicy::Flat { ceiling_bytes: 1024 }
        );
    }
}
