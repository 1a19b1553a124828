//! Cammy uploader
//!
//! Moves frames from a camera capture directory to the Cammy FTP endpoint,
//! keeping an optional local archive, and reorganizes FTP landing directories.

pub mod archive;
pub mod catalog;
pub mod instance_lock;
pub mod logging;
pub mod organizer;
pub mod pipeline;
pub mod resize;
pub mod summary;
pub mod transfer;

pub use cammy_config as config;
pub use cammy_config::UploaderConfig;
pub use archive::{ArchiveError, ArchiveReport, ArchiveStore, BucketedArchive, FlatArchive};
pub use catalog::{file_age, is_derived, list_images, CatalogError, DERIVED_SUFFIX};
pub use instance_lock::{InstanceGuard, LockError};
pub use organizer::{cleanup, organize, OrganizeReport, OrganizerError};
pub use pipeline::{PipelineError, UploadPipeline};
pub use resize::{derived_name, resize_image, ResizeError};
pub use summary::{FileOutcome, RunSummary};
pub use transfer::{
    retry, Connector, FtpConnector, PutOutcome, RemoteStore, RetryOutcome, TransferError,
    TransferSession,
};
