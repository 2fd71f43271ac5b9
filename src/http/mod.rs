//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, request id, tracing)
//!     → context.rs (method, route, headers, cookies, body within the relay's limit)
//!     → forward.rs (outbound request for the upstream)
//!     → [transport] raw upstream bytes
//!     → response.rs (status line, header multimap, body)
//!     → emitter.rs (replay every header occurrence, then the body)
//! ```
//!
//! # Design Decisions
//! - Inbound access goes through `InboundRequest`, not axum types, so the
//!   pipeline can be driven without a server
//! - Duplicate upstream headers are preserved end to end

pub mod context;
pub mod emitter;
pub mod forward;
pub mod request;
pub mod response;
pub mod server;

pub use context::{InboundBody, InboundRequest, RelayMethod, RequestContext};
pub use emitter::{HttpResponseSink, ResponseEmitter, ResponseSink};
pub use forward::ForwardRequest;
pub use request::{MakeRequestUuid, X_REQUEST_ID};
pub use response::{parse_response, HeaderMultimap, ResponseEnvelope};
pub use server::RelayServer;
