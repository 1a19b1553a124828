//! FTP implementation of the remote store.

use super::{Connector, RemoteStore, TransferError};
use cammy_config::RemoteConfig;
use std::io::{Read, Write};
use std::net::{SocketAddr, TcpStream, ToSocketAddrs};
use std::time::Duration;
use suppaftp::types::FileType;
use suppaftp::{FtpError, FtpStream};
use tracing::debug;

/// Connects and logs in to the configured FTP endpoint.
#[derive(Debug, Clone)]
pub struct FtpConnector {
    config: RemoteConfig,
}

impl FtpConnector {
    pub fn new(config: RemoteConfig) -> Self {
        Self { config }
    }

    fn resolve(&self) -> Result<SocketAddr, TransferError> {
        let address = self.config.address();
        let connect_err = |reason: String| TransferError::Connect {
            address: address.clone(),
            reason,
        };

        address
            .to_socket_addrs()
            .map_err(|e| connect_err(e.to_string()))?
            .next()
            .ok_or_else(|| connect_err("no addresses resolved".to_string()))
    }
}

impl Connector for FtpConnector {
    type Remote = FtpRemote;

    fn connect(&mut self) -> Result<FtpRemote, TransferError> {
        let addr = self.resolve()?;
        let timeout = self.config.timeout();

        // Data connections get the same bound as the control socket
        let mut stream = FtpStream::connect_timeout(addr, timeout)?.passive_stream_builder(
            move |addr| {
                TcpStream::connect_timeout(&addr, timeout).map_err(FtpError::ConnectionError)
            },
        );
        stream.get_ref().set_read_timeout(Some(timeout))?;
        stream.get_ref().set_write_timeout(Some(timeout))?;

        stream.login(self.config.username.as_str(), self.config.password.as_str())?;
        stream.transfer_type(FileType::Binary)?;
        debug!(address = %addr, user = %self.config.username, "Logged in");

        Ok(FtpRemote { stream, timeout })
    }
}

/// An authenticated FTP control connection.
pub struct FtpRemote {
    stream: FtpStream,
    timeout: Duration,
}

impl RemoteStore for FtpRemote {
    fn store(
        &mut self,
        name: &str,
        reader: &mut dyn Read,
        chunk_size: usize,
    ) -> Result<u64, TransferError> {
        let mut data = self.stream.put_with_stream(name)?;
        data.get_ref().set_write_timeout(Some(self.timeout))?;
        data.get_ref().set_read_timeout(Some(self.timeout))?;
        let mut buf = vec![0u8; chunk_size];
        let mut sent = 0u64;

        loop {
            let n = reader.read(&mut buf)?;
            if n == 0 {
                break;
            }
            data.write_all(&buf[..n])?;
            sent += n as u64;
            debug!(file = %name, bytes = sent, "Sent block");
        }

        self.stream.finalize_put_stream(data)?;
        Ok(sent)
    }

    fn noop(&mut self) -> Result<(), TransferError> {
        self.stream.noop()?;
        Ok(())
    }

    fn quit(&mut self) -> Result<(), TransferError> {
        self.stream.quit()?;
        Ok(())
    }
}
