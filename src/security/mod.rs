//! Security subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming call:
//!     → access_control.rs (client identity against the allow-list)
//!     → Pass to request context gathering
//! ```
//!
//! # Design Decisions
//! - Fail closed: a denied caller never reaches the upstream
//! - No allow-list configured means the relay is open

pub mod access_control;

pub use access_control::PermissionGate;
