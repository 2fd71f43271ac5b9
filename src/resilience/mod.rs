//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Request to upstream:
//!     → timeouts.rs (enforce connect/request deadline)
//!     → On expiry: TransportError::Timeout, terminal for the call
//! ```
//!
//! # Design Decisions
//! - Timeouts are non-negotiable; every upstream call has a deadline
//! - No retries: every failure is terminal for the current call

pub mod timeouts;

pub use timeouts::{with_timeout, Deadlines};
