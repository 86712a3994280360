//! HTTP health responder.
//!
//! # Responsibilities
//! - Build the Axum router for the fixed health surface
//! - Probe the backend once per health request
//! - Serve a classified connection (prefix replayed) with hyper
//! - Finish in-flight requests and close keep-alive connections on shutdown
//!
//! # Routes
//! ```text
//! /, /health, <http.health_path>   → probe → 200 JSON | 500 text
//! anything else                    → 404 text
//! ```

use axum::extract::State;
use axum::http::{StatusCode, Uri};
use axum::response::Response;
use axum::routing::any;
use axum::Router;
use bytes::Bytes;
use hyper::server::conn::http1;
use hyper_util::rt::{TokioIo, TokioTimer};
use hyper_util::service::TowerToHyperService;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite};
use tower_http::request_id::{PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::backend::BackendEndpoint;
use crate::http::request::{MakeRequestUuid, X_REQUEST_ID};
use crate::http::response;
use crate::lifecycle::ShutdownSignal;
use crate::net::Rewind;
use crate::observability::metrics;

/// Paths that always answer with the backend's health.
pub const BUILTIN_HEALTH_PATHS: [&str; 2] = ["/", "/health"];

/// Application state injected into handlers.
#[derive(Debug, Clone)]
pub struct AppState {
    pub backend: BackendEndpoint,
}

/// Build the health router.
///
/// `health_path` is served in addition to [`BUILTIN_HEALTH_PATHS`]. A
/// request still running after `request_timeout` gets a 408.
pub fn build_router(backend: BackendEndpoint, health_path: &str, request_timeout: Duration) -> Router {
    let mut router = Router::new();
    for path in BUILTIN_HEALTH_PATHS {
        router = router.route(path, any(health));
    }
    if !BUILTIN_HEALTH_PATHS.contains(&health_path) {
        router = router.route(health_path, any(health));
    }

    router
        .fallback(not_found)
        .with_state(AppState { backend })
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            request_timeout,
        ))
        .layer(PropagateRequestIdLayer::new(X_REQUEST_ID))
        .layer(TraceLayer::new_for_http())
        .layer(SetRequestIdLayer::new(X_REQUEST_ID, MakeRequestUuid))
}

/// Probe the backend exactly once and report the result.
async fn health(State(state): State<AppState>) -> Response {
    match state.backend.probe().await {
        Ok(()) => {
            metrics::record_health_check(true);
            response::healthy()
        }
        Err(e) => {
            tracing::warn!(backend = %state.backend.address(), error = %e, "Health check failed");
            metrics::record_health_check(false);
            response::unhealthy()
        }
    }
}

async fn not_found(uri: Uri) -> Response {
    tracing::debug!(path = %uri.path(), "No route matched");
    response::not_found()
}

/// Serve HTTP/1.1 on a classified connection.
///
/// `prefix` holds the bytes consumed during classification; they are read
/// again by hyper before anything else from `stream`. On shutdown the
/// request in flight completes and the connection is then closed.
pub async fn serve_connection<S>(
    stream: S,
    prefix: Bytes,
    router: Router,
    mut shutdown: ShutdownSignal,
) -> Result<(), hyper::Error>
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    let io = TokioIo::new(Rewind::new(prefix, stream));
    let service = TowerToHyperService::new(router);
    let conn = http1::Builder::new()
        .timer(TokioTimer::new())
        .serve_connection(io, service);
    tokio::pin!(conn);

    tokio::select! {
        result = conn.as_mut() => result,
        () = shutdown.recv() => {
            conn.as_mut().graceful_shutdown();
            conn.await
        }
    }
}
