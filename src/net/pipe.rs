//! Transparent bidirectional pipe to the backend.
//!
//! # Responsibilities
//! - Open one backend connection per store-protocol client
//! - Replay the classification prefix before anything else
//! - Relay bytes unmodified in both directions until either side closes
//!
//! # Session end
//! - Client EOF: the backend's write side is shut down and replies still
//!   flow back until the backend closes
//! - Backend EOF or error: the session ends at once and the client is closed
//! - No retries; bytes are never inspected here

use bytes::Bytes;
use std::io;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::backend::{BackendEndpoint, BackendError};

/// Byte counts for a finished pipe session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PipeStats {
    /// Including the replayed prefix.
    pub client_to_backend: u64,
    pub backend_to_client: u64,
}

/// Error type for pipe sessions.
#[derive(Debug, thiserror::Error)]
pub enum PipeError {
    #[error(transparent)]
    Backend(#[from] BackendError),
    #[error("failed to replay {len} buffered bytes to backend: {source}")]
    Replay { len: usize, source: io::Error },
    #[error("relay failed: {0}")]
    Relay(io::Error),
}

impl PipeError {
    /// Short label used in logs and metrics.
    pub fn outcome(&self) -> &'static str {
        match self {
            PipeError::Backend(_) => "backend_unreachable",
            PipeError::Replay { .. } => "replay_failed",
            PipeError::Relay(_) => "relay_failed",
        }
    }
}

/// Connect to `backend` and relay `client` through it.
pub async fn open<C>(
    client: C,
    prefix: Bytes,
    backend: &BackendEndpoint,
) -> Result<PipeStats, PipeError>
where
    C: AsyncRead + AsyncWrite + Unpin,
{
    let upstream = backend.connect().await?;
    tracing::debug!(backend = %backend.address(), "Backend connected");
    relay(client, prefix, upstream).await
}

const RELAY_BUF: usize = 16 * 1024;

/// Write `prefix` to `upstream`, then relay both ways until the backend
/// side finishes or either direction fails.
pub async fn relay<C, U>(client: C, prefix: Bytes, mut upstream: U) -> Result<PipeStats, PipeError>
where
    C: AsyncRead + AsyncWrite + Unpin,
    U: AsyncRead + AsyncWrite + Unpin,
{
    upstream
        .write_all(&prefix)
        .await
        .map_err(|source| PipeError::Replay {
            len: prefix.len(),
            source,
        })?;

    let (mut client_rd, mut client_wr) = tokio::io::split(client);
    let (mut upstream_rd, mut upstream_wr) = tokio::io::split(upstream);
    let mut sent = prefix.len() as u64;
    let mut received = 0u64;

    let result = {
        let to_backend = forward(&mut client_rd, &mut upstream_wr, &mut sent);
        let to_client = forward(&mut upstream_rd, &mut client_wr, &mut received);
        tokio::pin!(to_backend, to_client);

        let mut client_done = false;
        loop {
            tokio::select! {
                res = &mut to_backend, if !client_done => match res {
                    Ok(()) => client_done = true,
                    Err(e) => break Err(e),
                },
                res = &mut to_client => break res,
            }
        }
    };

    result.map_err(PipeError::Relay)?;
    Ok(PipeStats {
        client_to_backend: sent,
        backend_to_client: received,
    })
}

/// Copy `reader` into `writer` until EOF, then shut `writer` down.
async fn forward<R, W>(reader: &mut R, writer: &mut W, copied: &mut u64) -> io::Result<()>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut buf = vec![0u8; RELAY_BUF];
    loop {
        let n = reader.read(&mut buf).await?;
        if n == 0 {
            return writer.shutdown().await;
        }
        writer.write_all(&buf[..n]).await?;
        writer.flush().await?;
        *copied += n as u64;
    }
}
