//! Async driver for the classifier.
//!
//! Reads chunks from a fresh stream until the classifier reaches a verdict,
//! the peer closes, or the deadline passes. Every byte read is kept in the
//! returned prefix, including bytes past the deciding one.

use bytes::Bytes;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::time::{self, Instant};

use crate::protocol::classifier::{ClassificationState, Classifier, Protocol};

const READ_CHUNK: usize = 4096;

/// A classified connection prefix, ready to be replayed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sniffed {
    pub protocol: Protocol,
    pub prefix: Bytes,
}

/// Why a connection ended without a verdict.
#[derive(Debug, thiserror::Error)]
pub enum SniffError {
    #[error("connection closed before classification ({buffered} bytes buffered)")]
    Closed { buffered: usize },
    #[error("connection not classified within {timeout:?} ({buffered} bytes buffered)")]
    Timeout { timeout: Duration, buffered: usize },
    #[error("read failed during classification: {0}")]
    Io(#[from] std::io::Error),
}

impl SniffError {
    /// Short label used in logs and metrics.
    pub fn reason(&self) -> &'static str {
        match self {
            SniffError::Closed { .. } => "closed",
            SniffError::Timeout { .. } => "timeout",
            SniffError::Io(_) => "io",
        }
    }
}

/// Read from `stream` until its protocol is known.
pub async fn sniff<S>(stream: &mut S, timeout: Duration) -> Result<Sniffed, SniffError>
where
    S: AsyncRead + Unpin,
{
    let deadline = Instant::now() + timeout;
    let mut classifier = Classifier::new();
    let mut chunk = [0u8; READ_CHUNK];

    loop {
        let n = match time::timeout_at(deadline, stream.read(&mut chunk)).await {
            Ok(read) => read?,
            Err(_) => {
                classifier.invalidate();
                return Err(SniffError::Timeout {
                    timeout,
                    buffered: classifier.buffered(),
                });
            }
        };

        if n == 0 {
            classifier.invalidate();
            return Err(SniffError::Closed {
                buffered: classifier.buffered(),
            });
        }

        if let ClassificationState::Classified(protocol) = classifier.feed(&chunk[..n]) {
            return Ok(Sniffed {
                protocol,
                prefix: classifier.into_prefix(),
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncWriteExt;

    const TIMEOUT: Duration = Duration::from_secs(2);

    #[tokio::test]
    async fn classifies_http_in_one_chunk() {
        let (mut client, mut server) = tokio::io::duplex(1024);
        client.write_all(b"GET /health HTTP/1.1\r\nHost: x\r\n\r\n").await.unwrap();

        let sniffed = sniff(&mut server, TIMEOUT).await.unwrap();
        assert_eq!(sniffed.protocol, Protocol::Http);
        assert_eq!(&sniffed.prefix[..], b"GET /health HTTP/1.1\r\nHost: x\r\n\r\n");
    }

    #[tokio::test]
    async fn joins_split_chunks_in_order() {
        let (mut client, mut server) = tokio::io::duplex(1024);
        let writer = tokio::spawn(async move {
            for part in [&b"*"[..], b"1", b"\r", b"\n$4\r\nPING\r\n"] {
                client.write_all(part).await.unwrap();
                tokio::time::sleep(Duration::from_millis(20)).await;
            }
            client
        });

        let sniffed = sniff(&mut server, TIMEOUT).await.unwrap();
        assert_eq!(sniffed.protocol, Protocol::Store);
        assert_eq!(&sniffed.prefix[..], b"*1\r\n$4\r\nPING\r\n");
        drop(writer.await.unwrap());
    }

    #[tokio::test]
    async fn close_without_data_has_no_verdict() {
        let (client, mut server) = tokio::io::duplex(64);
        drop(client);

        let err = sniff(&mut server, TIMEOUT).await.unwrap_err();
        assert!(matches!(err, SniffError::Closed { buffered: 0 }));
        assert_eq!(err.reason(), "closed");
    }

    #[tokio::test]
    async fn close_after_short_prefix_has_no_verdict() {
        let (mut client, mut server) = tokio::io::duplex(64);
        client.write_all(b"*1").await.unwrap();
        drop(client);

        assert!(matches!(
            sniff(&mut server, TIMEOUT).await,
            Err(SniffError::Closed { buffered: 2 })
        ));
    }

    #[tokio::test]
    async fn stalled_prefix_times_out() {
        let (mut client, mut server) = tokio::io::duplex(64);
        client.write_all(b"GE").await.unwrap();

        let err = sniff(&mut server, Duration::from_millis(50)).await.unwrap_err();
        assert!(matches!(err, SniffError::Timeout { buffered: 2, .. }));
        drop(client);
    }
}
