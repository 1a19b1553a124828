//! Core configuration structures and validation

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

/// One gibibyte, the unit archive ceilings are expressed in.
pub const GIB: u64 = 1024 * 1024 * 1024;

/// Error type for configuration validation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// Username or password is empty
    MissingCredentials,
    /// Remote host is empty or port is zero
    InvalidEndpoint(String),
    /// Transfer chunk size of zero bytes
    ZeroChunkSize,
    /// Bucketed archive asked to keep zero days
    ZeroRetention,
    /// Flat archive ceiling of zero bytes
    ZeroCeiling,
    /// Resize bounding box with a zero dimension
    InvalidResizeBox { max_width: u32, max_height: u32 },
    /// JPEG quality outside 1..=100
    InvalidQuality(u8),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::MissingCredentials => write!(f, "FTP username and password are required"),
            ConfigError::InvalidEndpoint(e) => write!(f, "Invalid FTP endpoint: {}", e),
            ConfigError::ZeroChunkSize => write!(f, "Transfer chunk size must be non-zero"),
            ConfigError::ZeroRetention => write!(f, "Archive retention must keep at least one day"),
            ConfigError::ZeroCeiling => write!(f, "Archive size ceiling must be non-zero"),
            ConfigError::InvalidResizeBox {
                max_width,
                max_height,
            } => write!(f, "Invalid resize bounding box {}x{}", max_width, max_height),
            ConfigError::InvalidQuality(q) => write!(f, "JPEG quality {} is outside 1..=100", q),
        }
    }
}

impl std::error::Error for ConfigError {}

/// Remote FTP endpoint and credentials
#[derive(Clone, PartialEq)]
pub struct RemoteConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    /// Connect and socket idle timeout in seconds
    pub timeout_secs: u64,
    /// Block size used when streaming a file to the server
    pub chunk_size: usize,
}

fn default_host() -> String {
    "ftp.cammy.com".to_string()
}

fn default_port() -> u16 {
    10021
}

fn default_timeout_secs() -> u64 {
    60
}

fn default_chunk_size() -> usize {
    4096
}

impl RemoteConfig {
    /// Endpoint with the default host, port and timeouts.
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            username: username.into(),
            password: password.into(),
            timeout_secs: default_timeout_secs(),
            chunk_size: default_chunk_size(),
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// `host:port`, as used for address resolution and logging
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.username.is_empty() || self.password.is_empty() {
            return Err(ConfigError::MissingCredentials);
        }
        if self.host.trim().is_empty() {
            return Err(ConfigError::InvalidEndpoint("empty host".to_string()));
        }
        if self.port == 0 {
            return Err(ConfigError::InvalidEndpoint("port 0".to_string()));
        }
        if self.chunk_size == 0 {
            return Err(ConfigError::ZeroChunkSize);
        }
        Ok(())
    }
}

// The password never reaches the log.
impl fmt::Debug for RemoteConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RemoteConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("timeout_secs", &self.timeout_secs)
            .field("chunk_size", &self.chunk_size)
            .finish()
    }
}

/// Bounded retry for a single file transfer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first failed attempt (total attempts = max_retries + 1)
    pub max_retries: u32,
}

impl RetryPolicy {
    pub fn max_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self { max_retries: 10 }
    }
}

/// How the local archive is bounded
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchivePolicy {
    /// All files directly under the archive root, evicted by name once the
    /// tracked size would pass `ceiling_bytes`.
    Flat { ceiling_bytes: u64 },
    /// Files under `<YYYYMMDD>/<HH>/`, keeping the newest `retain_days` day buckets.
    Bucketed { retain_days: usize },
}

impl ArchivePolicy {
    /// Ceiling of the revised flat variant
    pub const DEFAULT_FLAT_CEILING: u64 = GIB;
}

impl Default for ArchivePolicy {
    fn default() -> Self {
        ArchivePolicy::Flat {
            ceiling_bytes: Self::DEFAULT_FLAT_CEILING,
        }
    }
}

/// Local archive location and policy
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveConfig {
    pub dir: PathBuf,
    pub policy: ArchivePolicy,
}

impl ArchiveConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        match self.policy {
            ArchivePolicy::Flat { ceiling_bytes: 0 } => Err(ConfigError::ZeroCeiling),
            ArchivePolicy::Bucketed { retain_days: 0 } => Err(ConfigError::ZeroRetention),
            _ => Ok(()),
        }
    }
}

/// Bounding box and encoder quality for derivatives
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResizeConfig {
    pub max_width: u32,
    pub max_height: u32,
    /// JPEG quality (1-100)
    pub quality: u8,
}

impl Default for ResizeConfig {
    fn default() -> Self {
        Self {
            max_width: 2000,
            max_height: 720,
            quality: 70,
        }
    }
}

impl ResizeConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_width == 0 || self.max_height == 0 {
            return Err(ConfigError::InvalidResizeBox {
                max_width: self.max_width,
                max_height: self.max_height,
            });
        }
        if !(1..=100).contains(&self.quality) {
            return Err(ConfigError::InvalidQuality(self.quality));
        }
        Ok(())
    }
}

/// Log file location and rotation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogConfig {
    pub path: PathBuf,
    /// Rotate once the active file reaches this many bytes
    pub max_bytes: usize,
    /// Number of rotated files kept next to the active one
    pub backups: usize,
    /// Default filter directive when `RUST_LOG` is unset
    pub level: String,
}

impl LogConfig {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            max_bytes: 5 * 1024 * 1024,
            backups: 7,
            level: "debug".to_string(),
        }
    }
}

/// Everything the uploader needs for one run
#[derive(Debug, Clone, PartialEq)]
pub struct UploaderConfig {
    pub image_dir: PathBuf,
    pub pid_file: PathBuf,
    pub log: LogConfig,
    pub remote: RemoteConfig,
    pub retry: RetryPolicy,
    /// Delete originals after upload and drop stale frames
    pub delete: bool,
    /// Upload a downsampled derivative instead of the original
    pub resize: Option<ResizeConfig>,
    pub archive: Option<ArchiveConfig>,
    /// Files older than this are dropped instead of uploaded (delete mode only)
    pub frame_drop_age_secs: u64,
    /// Upper bound on passes per run; `None` repeats while files remain
    pub max_passes: Option<u32>,
}

fn default_frame_drop_age_secs() -> u64 {
    60 * 60
}

impl UploaderConfig {
    pub fn new(image_dir: impl Into<PathBuf>, remote: RemoteConfig) -> Self {
        Self {
            image_dir: image_dir.into(),
            pid_file: PathBuf::from("/var/run/motion/cammyput.pid"),
            log: LogConfig::new("cammyput.log"),
            remote,
            retry: RetryPolicy::default(),
            delete: false,
            resize: None,
            archive: None,
            frame_drop_age_secs: default_frame_drop_age_secs(),
            max_passes: None,
        }
    }

    pub fn frame_drop_age(&self) -> Duration {
        Duration::from_secs(self.frame_drop_age_secs)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.remote.validate()?;
        if let Some(resize) = &self.resize {
            resize.validate()?;
        }
        if let Some(archive) = &self.archive {
            archive.validate()?;
        }
        Ok(())
    }
}

/// Settings for the landing-directory organizer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrganizerConfig {
    pub target: PathBuf,
    pub log: LogConfig,
    pub dry_run: bool,
    /// Day directories kept per camera
    pub keep_days: usize,
}

impl OrganizerConfig {
    pub fn new(target: impl Into<PathBuf>) -> Self {
        Self {
            target: target.into(),
            log: LogConfig::new("organizer.log"),
            dry_run: false,
            keep_days: 10,
        }
    }
}
