//! Per-run counters for the upload pipeline.

/// What the pipeline did with one catalog entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileOutcome {
    /// Resize derivative, never uploaded on its own
    SkippedDerived,
    /// Stale frame deleted without upload
    Dropped,
    /// Uploaded after `attempts` tries
    Uploaded { attempts: u32 },
    /// Gave up after `attempts` tries; file left in place
    Failed { attempts: u32 },
    /// Derivative could not be produced; file left in place
    ResizeFailed,
    /// File disappeared between listing and upload
    Vanished,
}

impl FileOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            FileOutcome::SkippedDerived => "skipped_derived",
            FileOutcome::Dropped => "dropped",
            FileOutcome::Uploaded { .. } => "uploaded",
            FileOutcome::Failed { .. } => "failed",
            FileOutcome::ResizeFailed => "resize_failed",
            FileOutcome::Vanished => "vanished",
        }
    }
}

/// Aggregate counters over one or more passes
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub passes: u32,
    pub uploaded: u64,
    pub dropped: u64,
    pub skipped_derived: u64,
    pub failed: u64,
    pub resize_failed: u64,
    pub vanished: u64,
    /// Transfer attempts beyond the first, across all files
    pub retries: u64,
    pub archived: u64,
}

impl RunSummary {
    pub fn record(&mut self, outcome: FileOutcome) {
        match outcome {
            FileOutcome::SkippedDerived => self.skipped_derived += 1,
            FileOutcome::Dropped => self.dropped += 1,
            FileOutcome::Uploaded { attempts } => {
                self.uploaded += 1;
                self.retries += u64::from(attempts.saturating_sub(1));
            }
            FileOutcome::Failed { attempts } => {
                self.failed += 1;
                self.retries += u64::from(attempts.saturating_sub(1));
            }
            FileOutcome::ResizeFailed => self.resize_failed += 1,
            FileOutcome::Vanished => self.vanished += 1,
        }
    }

    /// Adds another summary's counters to this one.
    pub fn merge(&mut self, other: &RunSummary) {
        self.passes += other.passes;
        self.uploaded += other.uploaded;
        self.dropped += other.dropped;
        self.skipped_derived += other.skipped_derived;
        self.failed += other.failed;
        self.resize_failed += other.resize_failed;
        self.vanished += other.vanished;
        self.retries += other.retries;
        self.archived += other.archived;
    }

    pub fn has_failures(&self) -> bool {
        self.failed > 0 || self.resize_failed > 0
    }
}
