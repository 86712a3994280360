//! The shared-port gateway.
//!
//! # Responsibilities
//! - Run the accept loop on the single listener
//! - Give every connection its own task, span and ID
//! - Classify, then hand the connection to the HTTP responder or the pipe
//! - On shutdown: stop accepting, close the listener, drain for a grace period
//!
//! # Design Decisions
//! - Errors never leave a connection task; only startup failures are fatal
//! - The only state shared between connections is immutable (endpoint,
//!   router) plus the atomic connection counter

use axum::Router;
use std::time::Duration;
use tokio::net::TcpStream;
use tracing::Instrument;

use crate::backend::BackendEndpoint;
use crate::config::ProxyConfig;
use crate::http;
use crate::lifecycle::ShutdownSignal;
use crate::net::pipe;
use crate::net::{ConnectionTracker, Listener, ListenerError};
use crate::observability::metrics;
use crate::protocol::{sniff, Protocol, SniffError};

/// Pause after a failed `accept` (e.g. EMFILE) before trying again.
const ACCEPT_BACKOFF: Duration = Duration::from_millis(50);

/// Error type for running the gateway.
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error(transparent)]
    Listener(#[from] ListenerError),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Everything a connection task needs. Cloned per connection.
#[derive(Debug, Clone)]
struct ConnectionContext {
    backend: BackendEndpoint,
    router: Router,
    classify_timeout: Duration,
    shutdown: ShutdownSignal,
}

/// Listener and lifecycle manager for the dual-protocol port.
#[derive(Debug)]
pub struct Gateway {
    backend: BackendEndpoint,
    router: Router,
    classify_timeout: Duration,
    grace: Duration,
    health_path: String,
    tracker: ConnectionTracker,
}

impl Gateway {
    /// Create a gateway from validated configuration.
    pub fn new(config: &ProxyConfig) -> Self {
        let backend = BackendEndpoint::from_config(&config.backend, &config.timeouts);
        let router = http::build_router(
            backend.clone(),
            &config.http.health_path,
            config.timeouts.request(),
        );

        Self {
            backend,
            router,
            classify_timeout: config.timeouts.classify(),
            grace: config.shutdown.grace(),
            health_path: config.http.health_path.clone(),
            tracker: ConnectionTracker::new(),
        }
    }

    /// Live connection counter, for observing drain from outside.
    pub fn tracker(&self) -> ConnectionTracker {
        self.tracker.clone()
    }

    /// Accept connections until `shutdown` fires, then close the listener
    /// and wait up to the grace period for in-flight connections.
    pub async fn run(self, listener: Listener, mut shutdown: ShutdownSignal) -> Result<(), GatewayError> {
        let local_addr = listener.local_addr()?;
        tracing::info!(
            address = %local_addr,
            backend = %self.backend.address(),
            health_path = %self.health_path,
            "Dual-protocol gateway listening"
        );

        let ctx = ConnectionContext {
            backend: self.backend.clone(),
            router: self.router.clone(),
            classify_timeout: self.classify_timeout,
            shutdown: shutdown.clone(),
        };

        loop {
            tokio::select! {
                biased;

                () = shutdown.recv() => break,

                accepted = listener.accept() => match accepted {
                    Ok((stream, peer_addr, slot)) => {
                        let guard = self.tracker.track();
                        let span = tracing::info_span!(
                            "connection",
                            id = %guard.id(),
                            peer = %peer_addr,
                        );
                        let ctx = ctx.clone();
                        tokio::spawn(
                            async move {
                                handle_connection(stream, ctx).await;
                                drop(slot);
                                drop(guard);
                            }
                            .instrument(span),
                        );
                    }
                    Err(ListenerError::Closed) => break,
                    Err(e) => {
                        tracing::warn!(error = %e, "Failed to accept connection");
                        tokio::time::sleep(ACCEPT_BACKOFF).await;
                    }
                },
            }
        }

        drop(listener);
        tracing::info!(address = %local_addr, "Listener closed");

        let active = self.tracker.active_count();
        if active > 0 {
            tracing::info!(active, grace = ?self.grace, "Waiting for in-flight connections");
            if !self.tracker.wait_idle(self.grace).await {
                tracing::warn!(
                    remaining = self.tracker.active_count(),
                    "Grace period elapsed, abandoning open connections"
                );
            }
        }

        tracing::info!("Gateway stopped");
        Ok(())
    }
}

async fn handle_connection(mut stream: TcpStream, ctx: ConnectionContext) {
    if let Err(e) = stream.set_nodelay(true) {
        tracing::debug!(error = %e, "Failed to set TCP_NODELAY");
    }

    let sniffed = match sniff(&mut stream, ctx.classify_timeout).await {
        Ok(sniffed) => sniffed,
        Err(e) => {
            metrics::record_classification_failure(e.reason());
            match e {
                SniffError::Io(_) => tracing::warn!(error = %e, "Classification failed"),
                _ => tracing::debug!(error = %e, "Connection ended without classification"),
            }
            return;
        }
    };

    metrics::record_classified(sniffed.protocol);

    match sniffed.protocol {
        Protocol::Http => {
            tracing::debug!(buffered = sniffed.prefix.len(), "Detected HTTP traffic");
            if let Err(e) =
                http::serve_connection(stream, sniffed.prefix, ctx.router, ctx.shutdown).await
            {
                tracing::debug!(error = %e, "HTTP connection error");
            }
        }
        Protocol::Store => {
            tracing::info!(buffered = sniffed.prefix.len(), "Detected store protocol traffic");
            match pipe::open(stream, sniffed.prefix, &ctx.backend).await {
                Ok(stats) => {
                    tracing::info!(
                        client_to_backend = stats.client_to_backend,
                        backend_to_client = stats.backend_to_client,
                        "Pipe session closed"
                    );
                    metrics::record_pipe_session("closed", Some(stats));
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Pipe session failed");
                    metrics::record_pipe_session(e.outcome(), None);
                }
            }
        }
    }
}
