//! Protocol detection subsystem.
//!
//! # Data Flow
//! ```text
//! Accepted TcpStream
//!     → sniff.rs (read chunks under a deadline)
//!     → classifier.rs (prefix match against the method table)
//!     → Sniffed { protocol, prefix }
//!     → http::serve_connection  (Http)
//!     → net::pipe::relay        (Store)
//! ```
//!
//! # Design Decisions
//! - Detection happens once, from the first bytes only
//! - The classifier is a plain value owned by the connection's task
//! - Nothing read during detection is discarded; the prefix is replayed

pub mod classifier;
pub mod sniff;

pub use classifier::{classify, ClassificationState, Classifier, Protocol};
pub use sniff::{sniff, SniffError, Sniffed};
