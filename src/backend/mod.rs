//! Backend store subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (optional):
//!     process.rs spawns the store, forwards its output to the log
//!
//! Per store-protocol connection:
//!     endpoint.rs connect() → net::pipe relays bytes
//!
//! Per health request:
//!     endpoint.rs probe() → PING / +PONG
//!
//! Shutdown:
//!     process.rs stop() after the listener is closed
//! ```
//!
//! # Design Decisions
//! - The endpoint is immutable and shared by clone; no cross-connection state
//! - The store protocol is never parsed here beyond the PING reply

pub mod endpoint;
pub mod process;

pub use endpoint::{BackendEndpoint, BackendError};
pub use process::{BackendProcess, ProcessError};
