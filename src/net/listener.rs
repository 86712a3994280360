//! The shared-port socket.
//!
//! # Responsibilities
//! - Bind the one address that carries both protocols
//! - Hand out accepted sockets together with a connection slot
//! - Cap concurrent connections at `listener.max_connections`
//!
//! # Design Decisions
//! - A slot is reserved before `accept`, so a full proxy stops pulling
//!   connections off the kernel backlog instead of accepting and dropping

use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

use crate::config::ListenerConfig;

#[derive(Debug, thiserror::Error)]
pub enum ListenerError {
    #[error("Failed to bind {address}: {source}")]
    Bind {
        address: String,
        source: std::io::Error,
    },
    #[error("Failed to accept: {0}")]
    Accept(std::io::Error),
    /// The slot pool was closed; no further connections will be accepted.
    #[error("Connection slots closed")]
    Closed,
}

/// TCP listener with a fixed number of connection slots.
#[derive(Debug)]
pub struct Listener {
    socket: TcpListener,
    slots: Arc<Semaphore>,
    capacity: usize,
}

impl Listener {
    pub async fn bind(config: &ListenerConfig) -> Result<Self, ListenerError> {
        let bind_error = |source| ListenerError::Bind {
            address: config.bind_address.clone(),
            source,
        };

        let addr: SocketAddr = config.bind_address.parse().map_err(|e| {
            bind_error(std::io::Error::new(std::io::ErrorKind::InvalidInput, e))
        })?;
        let socket = TcpListener::bind(addr).await.map_err(bind_error)?;
        let bound = socket.local_addr().map_err(bind_error)?;

        tracing::info!(
            address = %bound,
            capacity = config.max_connections,
            "Shared port bound"
        );

        Ok(Self {
            socket,
            slots: Arc::new(Semaphore::new(config.max_connections)),
            capacity: config.max_connections,
        })
    }

    /// Wait for a free slot, then for the next connection.
    ///
    /// The returned [`ConnectionSlot`] must live as long as the connection.
    pub async fn accept(&self) -> Result<(TcpStream, SocketAddr, ConnectionSlot), ListenerError> {
        let slot = Arc::clone(&self.slots)
            .acquire_owned()
            .await
            .map_err(|_| ListenerError::Closed)?;

        let (stream, peer) = self.socket.accept().await.map_err(ListenerError::Accept)?;
        tracing::debug!(peer = %peer, free_slots = self.slots.available_permits(), "Accepted");

        Ok((stream, peer, ConnectionSlot { _slot: slot }))
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.socket.local_addr()
    }

    pub fn free_slots(&self) -> usize {
        self.slots.available_permits()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

/// One reserved connection slot, returned to the listener on drop
/// (including when the connection task panics).
#[derive(Debug)]
pub struct ConnectionSlot {
    _slot: OwnedSemaphorePermit,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn local(max_connections: usize) -> ListenerConfig {
        ListenerConfig {
            bind_address: "127.0.0.1:0".into(),
            max_connections,
        }
    }

    #[tokio::test]
    async fn slots_are_returned_on_drop() {
        let listener = Listener::bind(&local(2)).await.unwrap();
        let addr = listener.local_addr().unwrap();

        let _client = TcpStream::connect(addr).await.unwrap();
        let (_stream, _peer, slot) = listener.accept().await.unwrap();
        assert_eq!(listener.free_slots(), 1);

        drop(slot);
        assert_eq!(listener.free_slots(), 2);
        assert_eq!(listener.capacity(), 2);
    }

    #[tokio::test]
    async fn bind_rejects_bad_address() {
        let config = ListenerConfig {
            bind_address: "not-an-address".into(),
            max_connections: 1,
        };
        assert!(matches!(
            Listener::bind(&config).await,
            Err(ListenerError::Bind { .. })
        ));
    }

    #[tokio::test]
    async fn bind_reports_address_in_use() {
        let first = Listener::bind(&local(1)).await.unwrap();
        let taken = ListenerConfig {
            bind_address: first.local_addr().unwrap().to_string(),
            max_connections: 1,
        };
        let err = Listener::bind(&taken).await.unwrap_err();
        assert!(err.to_string().contains(&taken.bind_address));
    }
}
