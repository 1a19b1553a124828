//! CLI entry point for the landing-directory organizer
//!
//! Sorts camera alarm clips into day/hour directories and prunes old days.

use cammy_config::{LogConfig, OrganizerConfig};
use cammy_uploader::{cleanup, logging, organize};
use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{error, info};

/// Cammy organizer - sort uploaded camera clips by date and hour
#[derive(Parser, Debug)]
#[command(name = "cammy-organize")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Log file
    #[arg(long, default_value = "organizer.log")]
    log: PathBuf,

    /// FTP landing directory with one subdirectory per camera
    #[arg(long, default_value = "ftp")]
    target: PathBuf,

    /// Only log what would be moved or removed
    #[arg(long)]
    dryrun: bool,

    /// Day directories kept per camera
    #[arg(long, default_value_t = 10)]
    keep_days: usize,
}

impl Args {
    fn into_config(self) -> OrganizerConfig {
        let mut config = OrganizerConfig::new(self.target);
        config.log = LogConfig::new(self.log);
        config.dry_run = self.dryrun;
        config.keep_days = self.keep_days;
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

    info!(target_dir = %config.target.display(), dry_run = config.dry_run, "Organizer started");

    let report = match organize(&config.target, config.dry_run) {
        Ok(report) => report,
        Err(e) => {
            error!(error = %e, "Organizing failed");
            return ExitCode::FAILURE;
        }
    };
    info!(?report, "Organizing done");

    if let Err(e) = cleanup(&config.target, config.keep_days, config.dry_run) {
        error!(error = %e, "Cleanup failed");
        return ExitCode::FAILURE;
    }

    info!("Finished");
    ExitCode::SUCCESS
}
