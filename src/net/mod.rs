//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming TCP connection
//!     → listener.rs (accept loop, connection limits)
//!     → connection.rs (identity, drain tracking)
//!     → protocol::sniff (classification)
//!     → rewind.rs  → HTTP layer          (Http)
//!     → pipe.rs    → backend connection  (Store)
//! ```
//!
//! # Design Decisions
//! - Bounded accept queue prevents resource exhaustion
//! - Each connection tracked for graceful shutdown
//! - Bytes read during classification are replayed, never re-read

pub mod connection;
pub mod listener;
pub mod pipe;
pub mod rewind;

pub use connection::{ConnectionGuard, ConnectionId, ConnectionTracker};
pub use listener::{ConnectionSlot, Listener, ListenerError};
pub use pipe::{PipeError, PipeStats};
pub use rewind::Rewind;
