//! Upstream transport subsystem.
//!
//! # Data Flow
//! ```text
//! ForwardRequest
//!     → select_transport (chosen once, when the relay is built)
//!         - client.rs (hyper client; synthesizes the raw stream from
//!           per-hop status and header metadata)
//!         - stream.rs (plain TCP; returns the bytes exactly as received)
//!     → raw response bytes: status line, headers, separator, body
//!     → http::response parser
//! ```
//!
//! # Design Decisions
//! - Both strategies honour the same raw-bytes contract, so parsing does
//!   not care which one ran
//! - Deadlines live here; the pipeline itself has none
//! - Only plain `http` upstreams are supported

pub mod client;
pub mod stream;

use std::sync::Arc;

use futures_util::future::BoxFuture;
use url::Url;

use crate::config::{TimeoutConfig, TransportKind, UpstreamConfig};
use crate::http::forward::ForwardRequest;
use crate::relay::error::TransportError;
use crate::resilience::Deadlines;

pub use client::ClientTransport;
pub use stream::StreamTransport;

/// Sends a forward request and returns the complete raw response.
pub trait Transport: Send + Sync {
    /// Strategy name, for logs and metrics.
    fn name(&self) -> &'static str;

    fn send<'a>(&'a self, request: &'a ForwardRequest) -> BoxFuture<'a, Result<Vec<u8>, TransportError>>;
}

/// Pick the transport strategy for an upstream.
pub fn select_transport(
    upstream: &UpstreamConfig,
    timeouts: &TimeoutConfig,
) -> Result<Arc<dyn Transport>, TransportError> {
    let base = parse_target(&upstream.base_address)?;
    let deadlines = Deadlines::from_config(timeouts);

    let client = || -> Arc<dyn Transport> {
        Arc::new(ClientTransport::new(
            deadlines,
            upstream.follow_redirects,
            upstream.max_redirects,
        ))
    };
    let stream = || -> Arc<dyn Transport> { Arc::new(StreamTransport::new(deadlines)) };

    let transport = match upstream.transport {
        TransportKind::Client => client(),
        TransportKind::Stream => stream(),
        TransportKind::Auto if ClientTransport::supports(&base) => client(),
        TransportKind::Auto if StreamTransport::supports(&base) => stream(),
        TransportKind::Auto => {
            return Err(TransportError::UnsupportedScheme(base.scheme().to_string()))
        }
    };

    tracing::info!(
        transport = transport.name(),
        upstream = %upstream.base_address,
        "Transport selected"
    );
    Ok(transport)
}

/// Parse a forward URL and check that it can be carried over plain HTTP.
pub(crate) fn parse_target(raw: &str) -> Result<Url, TransportError> {
    let url = Url::parse(raw).map_err(|e| TransportError::InvalidUrl {
        url: raw.to_string(),
        reason: e.to_string(),
    })?;

    if url.scheme() != "http" {
        return Err(TransportError::UnsupportedScheme(url.scheme().to_string()));
    }
    if url.host_str().is_none() {
        return Err(TransportError::InvalidUrl {
            url: raw.to_string(),
            reason: "missing host".to_string(),
        });
    }
    Ok(url)
}

/// Flatten an error and its sources into one line.
pub(crate) fn describe(error: &(dyn std::error::Error + 'static)) -> String {
    let mut message = error.to_string();
    let mut source = error.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}
