//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (main.rs):
//!     Load config → Validate → Spawn backend (optional) → Bind listener
//!
//! Shutdown (shutdown.rs):
//!     trigger() → Stop accepting → Close listener → Drain (grace) → Stop backend
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → trigger()
//!     second SIGTERM/SIGINT → immediate exit
//! ```
//!
//! # Design Decisions
//! - One idempotent trigger drives every shutdown step; no component
//!   installs its own signal handler
//! - Pipe sessions are not cancelled; they end with their peers or are
//!   abandoned when the grace period runs out

pub mod shutdown;
pub mod signals;

pub use shutdown::{Shutdown, ShutdownSignal};
