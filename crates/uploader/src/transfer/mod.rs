//! Transfer session to the remote store.
//!
//! [`TransferSession`] owns at most one live connection, opened lazily on the
//! first `put`. A failed `put` drops the connection so the next one starts
//! from a fresh connect. The wire protocol sits behind [`Connector`] and
//! [`RemoteStore`]; [`FtpConnector`] is the production implementation.

pub mod ftp;

pub use ftp::{FtpConnector, FtpRemote};

use cammy_config::RetryPolicy;
use std::fs::File;
use std::io::{ErrorKind, Read};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{error, info, warn};

/// Error type for transfer operations
#[derive(Debug, Error)]
pub enum TransferError {
    /// Could not resolve or reach the endpoint
    #[error("Failed to connect to {address}: {reason}")]
    Connect { address: String, reason: String },

    /// Server rejected a command or the control connection broke
    #[error("FTP error: {0}")]
    Protocol(#[from] suppaftp::FtpError),

    /// Local file could not be opened or read
    #[error("Failed to read {path}: {source}")]
    Source {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Data connection failed mid-transfer
    #[error("I/O error during transfer: {0}")]
    Io(#[from] std::io::Error),
}

/// A live session with the remote store.
pub trait RemoteStore {
    /// Stores `reader`'s contents as `name`, writing `chunk_size` bytes at a time.
    /// Returns the number of bytes sent.
    fn store(
        &mut self,
        name: &str,
        reader: &mut dyn Read,
        chunk_size: usize,
    ) -> Result<u64, TransferError>;

    /// Round-trips a no-op to confirm the session is still healthy.
    fn noop(&mut self) -> Result<(), TransferError>;

    /// Ends the session gracefully.
    fn quit(&mut self) -> Result<(), TransferError>;
}

/// Opens authenticated sessions.
pub trait Connector {
    type Remote: RemoteStore;

    fn connect(&mut self) -> Result<Self::Remote, TransferError>;
}

/// Owner of the single remote connection.
pub struct TransferSession<C: Connector> {
    connector: C,
    remote: Option<C::Remote>,
    chunk_size: usize,
    connects: u32,
}

impl<C: Connector> TransferSession<C> {
    pub fn new(connector: C, chunk_size: usize) -> Self {
        Self {
            connector,
            remote: None,
            chunk_size: chunk_size.max(1),
            connects: 0,
        }
    }

    /// Whether a connection is currently held
    pub fn is_connected(&self) -> bool {
        self.remote.is_some()
    }

    /// Number of connections opened over the session's lifetime
    pub fn connects(&self) -> u32 {
        self.connects
    }

    /// Uploads `dir/filename` under its own name.
    ///
    /// A file that no longer exists is reported as [`PutOutcome::Missing`]
    /// and leaves the connection alone. Remote failures tear the connection
    /// down so that the next call reconnects.
    pub fn put(&mut self, dir: &Path, filename: &str) -> PutOutcome {
        match self.try_put(dir, filename) {
            Ok(bytes) => {
                info!(file = %filename, bytes, "FTP STOR completed");
                PutOutcome::Stored { bytes }
            }
            Err(TransferError::Source { path, source }) if source.kind() == ErrorKind::NotFound => {
                warn!(file = %path.display(), "File disappeared before upload");
                PutOutcome::Missing
            }
            Err(e @ TransferError::Source { .. }) => {
                error!(file = %filename, error = %e, "Cannot read image");
                PutOutcome::Failed
            }
            Err(e) => {
                error!(file = %filename, error = %e, "Exception during putting image");
                self.reset();
                PutOutcome::Failed
            }
        }
    }

    fn try_put(&mut self, dir: &Path, filename: &str) -> Result<u64, TransferError> {
        let path = dir.join(filename);
        let mut file = File::open(&path).map_err(|source| TransferError::Source {
            path: path.clone(),
            source,
        })?;

        info!(file = %path.display(), "FTP STOR");
        let chunk_size = self.chunk_size;
        let remote = self.connection()?;
        let bytes = remote.store(filename, &mut file, chunk_size)?;
        remote.noop()?;
        Ok(bytes)
    }

    fn connection(&mut self) -> Result<&mut C::Remote, TransferError> {
        let remote = match self.remote.take() {
            Some(remote) => remote,
            None => {
                info!("Connecting to FTP server");
                let remote = self.connector.connect()?;
                self.connects += 1;
                remote
            }
        };
        Ok(self.remote.insert(remote))
    }

    /// Drops the connection without a graceful quit.
    pub fn reset(&mut self) {
        self.remote = None;
    }

    /// Quits the live connection, if any. Never fails.
    pub fn close(&mut self) {
        if let Some(mut remote) = self.remote.take() {
            if let Err(e) = remote.quit() {
                warn!(error = %e, "Exception during closing the FTP handle");
            }
        }
    }
}

impl<C: Connector> Drop for TransferSession<C> {
    fn drop(&mut self) {
        self.close();
    }
}

/// Result of a single `put`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PutOutcome {
    Stored { bytes: u64 },
    /// The local file is gone; retrying cannot help
    Missing,
    Failed,
}

/// Outcome of a bounded retry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryOutcome {
    Succeeded { attempts: u32 },
    Exhausted { attempts: u32 },
    /// The file vanished; no further attempts were made
    Missing { attempts: u32 },
}

/// Runs `op` until it stores the file, reports it missing, or the policy's
/// attempts are used up.
///
/// `op` receives the 1-based attempt number.
pub fn retry<F>(policy: &RetryPolicy, mut op: F) -> RetryOutcome
where
    F: FnMut(u32) -> PutOutcome,
{
    let mut remaining = policy.max_attempts();
    let mut attempt = 0;
    while remaining > 0 {
        remaining -= 1;
        attempt += 1;
        match op(attempt) {
            PutOutcome::Stored { .. } => return RetryOutcome::Succeeded { attempts: attempt },
            PutOutcome::Missing => return RetryOutcome::Missing { attempts: attempt },
            PutOutcome::Failed => {}
        }
    }
    RetryOutcome::Exhausted { attempts: attempt }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::cell::RefCell;
    use std::io;
    use std::rc::Rc;
    use tempfile::TempDir;

    #[derive(Default)]
    struct Script {
        connects: u32,
        fail_connects: u32,
        fail_stores: u32,
        fail_noops: u32,
        quits: u32,
        stored: Vec<(String, Vec<u8>)>,
        chunk_sizes: Vec<usize>,
    }

    struct FakeRemote(Rc<RefCell<Script>>);

    impl RemoteStore for FakeRemote {
        fn store(
            &mut self,
            name: &str,
            reader: &mut dyn Read,
            chunk_size: usize,
        ) -> Result<u64, TransferError> {
            let mut script = self.0.borrow_mut();
            script.chunk_sizes.push(chunk_size);
            if script.fail_stores > 0 {
                script.fail_stores -= 1;
                return Err(io::Error::new(io::ErrorKind::ConnectionReset, "reset").into());
            }
            let mut data = Vec::new();
            reader.read_to_end(&mut data)?;
            let len = data.len() as u64;
            script.stored.push((name.to_string(), data));
            Ok(len)
        }

        fn noop(&mut self) -> Result<(), TransferError> {
            let mut script = self.0.borrow_mut();
            if script.fail_noops > 0 {
                script.fail_noops -= 1;
                return Err(io::Error::new(io::ErrorKind::BrokenPipe, "noop").into());
            }
            Ok(())
        }

        fn quit(&mut self) -> Result<(), TransferError> {
            self.0.borrow_mut().quits += 1;
            Err(io::Error::new(io::ErrorKind::BrokenPipe, "already gone").into())
        }
    }

    struct FakeConnector(Rc<RefCell<Script>>);

    impl Connector for FakeConnector {
        type Remote = FakeRemote;

        fn connect(&mut self) -> Result<FakeRemote, TransferError> {
            let mut script = self.0.borrow_mut();
            if script.fail_connects > 0 {
                script.fail_connects -= 1;
                return Err(TransferError::Connect {
                    address: "ftp.example:21".to_string(),
                    reason: "refused".to_string(),
                });
            }
            script.connects += 1;
            Ok(FakeRemote(self.0.clone()))
        }
    }

    fn session(script: &Rc<RefCell<Script>>) -> TransferSession<FakeConnector> {
        TransferSession::new(FakeConnector(script.clone()), 4096)
    }

    fn stored(outcome: PutOutcome) -> bool {
        matches!(outcome, PutOutcome::Stored { .. })
    }

    fn capture_dir() -> TempDir {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("a.jpg"), b"frame-a").unwrap();
        std::fs::write(dir.path().join("b.jpg"), b"frame-b").unwrap();
        dir
    }

    #[test]
    fn test_connection_is_lazy_and_reused() {
        let script = Rc::new(RefCell::new(Script::default()));
        let dir = capture_dir();
        let mut session = session(&script);

        assert!(!session.is_connected());
        assert!(stored(session.put(dir.path(), "a.jpg")));
        assert!(stored(session.put(dir.path(), "b.jpg")));

        assert_eq!(session.connects(), 1);
        let script = script.borrow();
        assert_eq!(script.stored[0], ("a.jpg".to_string(), b"frame-a".to_vec()));
        assert_eq!(script.chunk_sizes, vec![4096, 4096]);
    }

    #[test]
    fn test_failed_store_forces_reconnect() {
        let script = Rc::new(RefCell::new(Script {
            fail_stores: 1,
            ..Script::default()
        }));
        let dir = capture_dir();
        let mut session = session(&script);

        assert_eq!(session.put(dir.path(), "a.jpg"), PutOutcome::Failed);
        assert!(!session.is_connected());
        assert!(stored(session.put(dir.path(), "a.jpg")));
        assert_eq!(session.connects(), 2);
    }

    #[test]
    fn test_failed_noop_forces_reconnect() {
        let script = Rc::new(RefCell::new(Script {
            fail_noops: 1,
            ..Script::default()
        }));
        let dir = capture_dir();
        let mut session = session(&script);

        assert_eq!(session.put(dir.path(), "a.jpg"), PutOutcome::Failed);
        assert!(stored(session.put(dir.path(), "a.jpg")));
        assert_eq!(session.connects(), 2);
    }

    #[test]
    fn test_failed_connect_is_a_failure() {
        let script = Rc::new(RefCell::new(Script {
            fail_connects: 1,
            ..Script::default()
        }));
        let dir = capture_dir();
        let mut session = session(&script);

        assert_eq!(session.put(dir.path(), "a.jpg"), PutOutcome::Failed);
        assert!(!session.is_connected());
        assert!(stored(session.put(dir.path(), "a.jpg")));
        assert_eq!(session.connects(), 1);
    }

    #[test]
    fn test_missing_file_keeps_connection() {
        let script = Rc::new(RefCell::new(Script::default()));
        let dir = capture_dir();
        let mut session = session(&script);

        assert!(stored(session.put(dir.path(), "a.jpg")));
        assert_eq!(session.put(dir.path(), "gone.jpg"), PutOutcome::Missing);
        assert!(session.is_connected());
        assert!(stored(session.put(dir.path(), "b.jpg")));

        assert_eq!(session.connects(), 1);
        assert_eq!(script.borrow().stored.len(), 2);
    }

    #[test]
    fn test_close_swallows_quit_errors() {
        let script = Rc::new(RefCell::new(Script::default()));
        let dir = capture_dir();
        let mut session = session(&script);

        assert!(stored(session.put(dir.path(), "a.jpg")));
        session.close();
        assert!(!session.is_connected());
        session.close();
        assert_eq!(script.borrow().quits, 1);
    }

    #[test]
    fn test_retry_counts_attempts() {
        let policy = RetryPolicy { max_retries: 10 };
        let mut calls = 0;
        let outcome = retry(&policy, |attempt| {
            calls += 1;
            if attempt == 4 {
                PutOutcome::Stored { bytes: 1 }
            } else {
                PutOutcome::Failed
            }
        });
        assert_eq!(outcome, RetryOutcome::Succeeded { attempts: 4 });
        assert_eq!(calls, 4);
    }

    #[test]
    fn test_retry_exhausts() {
        let policy = RetryPolicy { max_retries: 2 };
        let outcome = retry(&policy, |_| PutOutcome::Failed);
        assert_eq!(outcome, RetryOutcome::Exhausted { attempts: 3 });
    }

    #[test]
    fn test_retry_stops_on_missing_file() {
        let policy = RetryPolicy { max_retries: 10 };
        let mut calls = 0;
        let outcome = retry(&policy, |_| {
            calls += 1;
            PutOutcome::Missing
        });
        assert_eq!(outcome, RetryOutcome::Missing { attempts: 1 });
        assert_eq!(calls, 1);
    }

    // A failed put always leads to a fresh connect on the next put.
    proptest! {
        #![proptest_config(ProptestConfig::with_cases(50))]

        #[test]
        fn prop_failure_forces_fresh_connect(failures in proptest::collection::vec(any::<bool>(), 1..20)) {
            let script = Rc::new(RefCell::new(Script::default()));
            let dir = capture_dir();
            let mut session = session(&script);

            let mut expected_connects = 0;
            let mut connected = false;
            for fail in failures {
                if !connected {
                    expected_connects += 1;
                }
                script.borrow_mut().fail_stores = u32::from(fail);
                let ok = stored(session.put(dir.path(), "a.jpg"));
                prop_assert_eq!(ok, !fail);
                connected = ok;
                prop_assert_eq!(session.is_connected(), ok);
                prop_assert_eq!(session.connects(), expected_connects);
            }
        }
    }
}
