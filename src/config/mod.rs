//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → RelayConfig (validated, immutable)
//!     → Relay built from it, shared via Arc
//!
//! On file change:
//!     watcher.rs detects change
//!     → loader.rs reparses the file (read_config, no validation)
//!     → binary re-applies CLI overrides, validation.rs validates
//!     → server builds a new Relay and swaps it in atomically
//!       (a config the relay rejects is logged and the old Relay stays)
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; changes require full reload
//! - All fields except the upstream address have defaults
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;
pub mod watcher;

pub use loader::{load_config, parse_config, read_config, ConfigError};
pub use schema::{
    AccessConfig, ErrorConfig, ListenerConfig, LogFormat, ObservabilityConfig, RelayConfig,
    RequestConfig, ResponseConfig, TimeoutConfig, TransportKind, UpstreamConfig,
};
