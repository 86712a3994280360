//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! Connection classified as HTTP (prefix + stream)
//!     → server.rs (Rewind replay, hyper connection, Axum router)
//!     → request.rs (request ID)
//!     → health handler → backend probe
//!     → response.rs (fixed JSON / text bodies)
//!     → Send to client
//! ```

pub mod request;
pub mod response;
pub mod server;

pub use request::{MakeRequestUuid, X_REQUEST_ID};
pub use server::{build_router, serve_connection, AppState};
