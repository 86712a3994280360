//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems produce:
//!     → logging.rs (structured log events, per-connection spans)
//!     → metrics.rs (counters, gauges)
//!
//! Consumers:
//!     → stdout (pretty or JSON lines)
//!     → Prometheus scrape on a separate, optional address
//! ```
//!
//! # Design Decisions
//! - Connection ID flows through every event via the connection span
//! - Metrics are no-ops until an exporter is installed
//! - The shared port never serves metrics; its HTTP surface is fixed

pub mod logging;
pub mod metrics;
