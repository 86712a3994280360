//! Backend endpoint handle.
//!
//! # Responsibilities
//! - Hold the immutable address of the internal store process
//! - Open new connections for pipe sessions (bounded by connect timeout)
//! - Answer liveness probes with a single PING round trip

use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time;

use crate::config::{BackendConfig, TimeoutConfig};

/// RESP encoding of `PING` as sent by `redis-cli ping`.
const PING: &[u8] = b"*1\r\n$4\r\nPING\r\n";

/// The only reply accepted as healthy.
const PONG: &[u8] = b"+PONG\r\n";

/// Upper bound on how much of a reply is read while looking for the
/// terminating CRLF.
const MAX_REPLY: usize = 512;

/// Error type for backend connections and liveness probes.
#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    #[error("failed to connect to backend {address}: {source}")]
    Connect {
        address: String,
        source: std::io::Error,
    },
    #[error("backend {address} did not respond within {timeout:?}")]
    Timeout { address: String, timeout: Duration },
    #[error("backend I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("unexpected reply from backend: {0:?}")]
    UnexpectedReply(String),
}

/// Address of the internal store process plus the timeouts used to
/// reach it. Cheap to clone; never changes after startup.
#[derive(Debug, Clone)]
pub struct BackendEndpoint {
    address: String,
    connect_timeout: Duration,
    probe_timeout: Duration,
}

impl BackendEndpoint {
    pub fn new(address: impl Into<String>, connect_timeout: Duration, probe_timeout: Duration) -> Self {
        Self {
            address: address.into(),
            connect_timeout,
            probe_timeout,
        }
    }

    pub fn from_config(backend: &BackendConfig, timeouts: &TimeoutConfig) -> Self {
        Self::new(backend.address.clone(), timeouts.connect(), timeouts.probe())
    }

    /// The configured `host:port`.
    pub fn address(&self) -> &str {
        &self.address
    }

    /// Open a fresh connection to the backend.
    pub async fn connect(&self) -> Result<TcpStream, BackendError> {
        let stream = time::timeout(self.connect_timeout, TcpStream::connect(&self.address))
            .await
            .map_err(|_| BackendError::Timeout {
                address: self.address.clone(),
                timeout: self.connect_timeout,
            })?
            .map_err(|source| BackendError::Connect {
                address: self.address.clone(),
                source,
            })?;

        // Store traffic is request/response; don't let Nagle hold back small frames.
        stream.set_nodelay(true)?;
        Ok(stream)
    }

    /// Send one PING and require an exact `+PONG` reply.
    ///
    /// Connect time counts against the probe timeout as a whole. No retries.
    pub async fn probe(&self) -> Result<(), BackendError> {
        time::timeout(self.probe_timeout, self.ping())
            .await
            .map_err(|_| BackendError::Timeout {
                address: self.address.clone(),
                timeout: self.probe_timeout,
            })?
    }

    async fn ping(&self) -> Result<(), BackendError> {
        let mut stream = self.connect().await?;
        stream.write_all(PING).await?;

        let reply = read_line(&mut stream).await?;
        if reply == PONG {
            Ok(())
        } else {
            Err(BackendError::UnexpectedReply(
                String::from_utf8_lossy(&reply).trim_end().to_string(),
            ))
        }
    }
}

/// Read until the first CRLF (inclusive), EOF, or `MAX_REPLY` bytes.
async fn read_line(stream: &mut TcpStream) -> Result<Vec<u8>, BackendError> {
    let mut reply = Vec::with_capacity(16);
    let mut chunk = [0u8; 64];

    loop {
        let n = stream.read(&mut chunk).await?;
        if n == 0 {
            break;
        }
        reply.extend_from_slice(&chunk[..n]);
        if reply.windows(2).any(|w| w == b"\r\n") || reply.len() >= MAX_REPLY {
            break;
        }
    }

    Ok(reply)
}
