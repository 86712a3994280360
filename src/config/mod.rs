//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML, optional)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → CLI overrides (main.rs)
//!     → ProxyConfig (validated, immutable)
//!     → copied into the gateway at startup
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; the backend endpoint never changes
//!   for the lifetime of the process
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, ConfigError};
pub use schema::{
    BackendConfig, HttpConfig, ListenerConfig, LogFormat, ObservabilityConfig, ProxyConfig,
    ShutdownConfig, TimeoutConfig,
};
pub use validation::{validate_config, ValidationError};
