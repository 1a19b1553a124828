//! Upload pipeline and main loop
//!
//! One pass walks the capture directory in catalog order:
//! 1. Archive the whole directory (if an archive is configured)
//! 2. For each frame: skip derivatives, drop stale frames, resize, upload
//!    with bounded retry, delete on success
//! 3. Close the FTP session
//!
//! With deletion enabled, passes repeat while frames remain and the last
//! pass made progress.

use crate::archive::ArchiveStore;
use crate::catalog::{file_age_at, is_derived, list_images, CatalogError};
use crate::instance_lock::LockError;
use crate::resize::resize_image;
use crate::summary::{FileOutcome, RunSummary};
use crate::transfer::{retry, Connector, RetryOutcome, TransferSession};
use cammy_config::{ConfigError, ResizeConfig, RetryPolicy, UploaderConfig};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use thiserror::Error;
use tracing::{debug, error, info, warn};

/// Error type for pipeline operations
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Capture directory could not be listed
    #[error(transparent)]
    Catalog(#[from] CatalogError),

    /// Single-instance lock error
    #[error("Lock error: {0}")]
    Lock(#[from] LockError),
}

/// Drives catalog, archive, resizer and transfer session.
pub struct UploadPipeline<C: Connector> {
    image_dir: PathBuf,
    delete: bool,
    resize: Option<ResizeConfig>,
    retry: RetryPolicy,
    frame_drop_age: Duration,
    max_passes: Option<u32>,
    archive: Option<ArchiveStore>,
    session: TransferSession<C>,
    clock: fn() -> SystemTime,
}

impl<C: Connector> UploadPipeline<C> {
    /// Build a pipeline from validated configuration.
    pub fn new(config: &UploaderConfig, connector: C) -> Result<Self, PipelineError> {
        config.validate()?;

        Ok(Self {
            image_dir: config.image_dir.clone(),
            delete: config.delete,
            resize: config.resize,
            retry: config.retry,
            frame_drop_age: config.frame_drop_age(),
            max_passes: config.max_passes,
            archive: config.archive.as_ref().map(ArchiveStore::from_config),
            session: TransferSession::new(connector, config.remote.chunk_size),
            clock: SystemTime::now,
        })
    }

    /// Replace the time source used for frame ages.
    pub fn with_clock(mut self, clock: fn() -> SystemTime) -> Self {
        self.clock = clock;
        self
    }

    pub fn session(&self) -> &TransferSession<C> {
        &self.session
    }

    /// Run passes until nothing is left to do.
    ///
    /// Another pass follows only when deletion is enabled and the capture
    /// directory is still non-empty, which picks up frames that arrived
    /// during the previous pass. A pass that neither uploaded nor dropped
    /// anything ends the run, as does `max_passes`.
    pub fn run(&mut self) -> Result<RunSummary, PipelineError> {
        let mut total = RunSummary::default();

        loop {
            let pass = self.run_pass()?;
            total.merge(&pass);

            if !self.delete {
                break;
            }

            let remaining = list_images(&self.image_dir)?.len();
            if remaining == 0 {
                break;
            }

            if pass.uploaded == 0 && pass.dropped == 0 {
                warn!(remaining, "Last pass made no progress, stopping");
                break;
            }

            if let Some(max) = self.max_passes {
                if total.passes >= max {
                    warn!(remaining, passes = total.passes, "Pass limit reached, stopping");
                    break;
                }
            }

            info!(remaining, "More images to upload, sending again");
        }

        Ok(total)
    }

    /// Run a single pass over the capture directory.
    pub fn run_pass(&mut self) -> Result<RunSummary, PipelineError> {
        let names = list_images(&self.image_dir)?;
        let mut summary = RunSummary {
            passes: 1,
            ..RunSummary::default()
        };

        if let Some(archive) = &self.archive {
            match archive.archive_all(&self.image_dir) {
                Ok(report) => {
                    summary.archived = report.archived() as u64;
                    info!(?report, "Archiving done");
                }
                Err(e) => error!(error = %e, "Archiving failed"),
            }
        }

        for name in &names {
            let outcome = self.process_file(name);
            debug!(file = %name, outcome = outcome.as_str(), "File processed");
            summary.record(outcome);
        }

        self.session.close();

        info!(
            uploaded = summary.uploaded,
            dropped = summary.dropped,
            failed = summary.failed,
            resize_failed = summary.resize_failed,
            vanished = summary.vanished,
            retries = summary.retries,
            "Pass complete"
        );
        Ok(summary)
    }

    fn process_file(&mut self, name: &str) -> FileOutcome {
        if is_derived(name) {
            return FileOutcome::SkippedDerived;
        }

        if self.delete {
            let age = file_age_at(&self.image_dir, name, (self.clock)());
            if age > self.frame_drop_age {
                warn!(file = %name, age_secs = age.as_secs(), "Frame drop! Dropping");
                remove_image(&self.image_dir, name);
                return FileOutcome::Dropped;
            }
        }

        let upload_name = match &self.resize {
            Some(cfg) => match resize_image(&self.image_dir, name, cfg) {
                Ok(derived) => derived,
                Err(e) => {
                    error!(file = %name, error = %e, "Resize failed, leaving file in place");
                    return FileOutcome::ResizeFailed;
                }
            },
            None => name.to_string(),
        };

        let dir = self.image_dir.clone();
        let session = &mut self.session;
        let outcome = retry(&self.retry, |attempt| {
            if attempt > 1 {
                info!(file = %upload_name, attempt, "Problem during storing, retrying");
            }
            session.put(&dir, &upload_name)
        });

        match outcome {
            RetryOutcome::Succeeded { attempts } => {
                if self.delete {
                    remove_image(&self.image_dir, &upload_name);
                    remove_image(&self.image_dir, name);
                }
                FileOutcome::Uploaded { attempts }
            }
            RetryOutcome::Exhausted { attempts } => {
                error!(file = %upload_name, attempts, "Retry count exceeded, giving up on file");
                if upload_name != name {
                    // The derivative is regenerated on the next attempt
                    remove_image(&self.image_dir, &upload_name);
                }
                FileOutcome::Failed { attempts }
            }
            RetryOutcome::Missing { .. } => {
                warn!(file = %upload_name, "File vanished before upload, skipping");
                FileOutcome::Vanished
            }
        }
    }
}

/// Deletes `dir/name` if it is a file. Failures are logged, not returned.
fn remove_image(dir: &Path, name: &str) {
    let path = dir.join(name);
    if !path.is_file() {
        return;
    }
    info!(file = %path.display(), "Removing");
    if let Err(e) = fs::remove_file(&path) {
        warn!(file = %path.display(), error = %e, "Failed to remove file");
    }
}
