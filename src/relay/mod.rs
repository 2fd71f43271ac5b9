//! Relay subsystem.
//!
//! # Data Flow
//! ```text
//! http::server handler
//!     → pipeline.rs (gate, gather, forward, send, parse, emit)
//!     → error.rs (one error type per stage, mapped to a status code)
//! ```
//!
//! # Design Decisions
//! - One `Relay` per configuration; a reload swaps the whole value
//! - Errors never partially emit: headers go out only after a full parse

pub mod error;
pub mod pipeline;

pub use error::{ProtocolError, RelayError, RelayResult, RequestError, TransportError};
pub use pipeline::Relay;
