//! Dual-protocol proxy library.
//!
//! One TCP port, two protocols: HTTP requests get a health answer about the
//! key-value store, store-protocol (RESP) clients get a transparent pipe to it.

// Core subsystems
pub mod config;
pub mod gateway;
pub mod http;
pub mod net;
pub mod protocol;

// Backend store
pub mod backend;

// Cross-cutting concerns
pub mod lifecycle;
pub mod observability;

pub use config::schema::ProxyConfig;
pub use gateway::{Gateway, GatewayError};
pub use lifecycle::Shutdown;
pub use net::Listener;
pub use protocol::Protocol;
