//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Shutdown::trigger
//!
//! Shutdown (shutdown.rs):
//!     trigger → server stops accepting → in-flight calls drain → exit
//! ```
//!
//! # Design Decisions
//! - One broadcast channel; only the server subscribes. The config watcher
//!   lives as long as `main` and stops with it
//! - In-flight relay calls are never cancelled, only drained

pub mod shutdown;
pub mod signals;

pub use shutdown::Shutdown;
pub use signals::shutdown_signal;
