//! Error taxonomy for a relay call.
//!
//! Every error is terminal for the call that raised it. The hosting server
//! decides how much of the message reaches the caller.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

use crate::config::ConfigError;
use crate::config::validation::ValidationError;

pub type RelayResult<T> = Result<T, RelayError>;

/// Any failure of the relay pipeline.
#[derive(Debug, Error)]
pub enum RelayError {
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("requests from hostname ({identity}) are not allowed")]
    Permission { identity: String },

    #[error(transparent)]
    Request(#[from] RequestError),

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Protocol(#[from] ProtocolError),
}

/// The inbound call cannot be turned into a request context.
#[derive(Debug, Clone, Error)]
pub enum RequestError {
    #[error("request method ({0}) invalid")]
    InvalidMethod(String),

    #[error("missing '{0}' parameter in the request")]
    MissingRoute(String),

    #[error("no HTTP user agent was found")]
    MissingUserAgent,

    #[error("could not get request headers")]
    HeadersUnavailable,

    #[error("could not read request body: {0}")]
    BodyUnreadable(String),

    #[error("request body exceeds {limit} bytes")]
    BodyTooLarge { limit: usize },
}

/// The upstream could not be reached or did not answer.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("invalid upstream url ({url}): {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("unsupported upstream scheme ({0})")]
    UnsupportedScheme(String),

    #[error("failed to connect to {addr}: {source}")]
    Connect {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("upstream io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("upstream {stage} timed out after {secs}s")]
    Timeout { stage: &'static str, secs: u64 },

    #[error("upstream request failed: {0}")]
    Client(String),
}

/// The upstream answered with bytes that are not an HTTP response.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolError {
    #[error("a valid response was not received from the host")]
    NoValidResponse,

    #[error("response has no status line")]
    MissingStatusLine,
}

impl From<ConfigError> for RelayError {
    fn from(e: ConfigError) -> Self {
        RelayError::Configuration(e.to_string())
    }
}

impl From<ValidationError> for RelayError {
    fn from(e: ValidationError) -> Self {
        RelayError::Configuration(e.to_string())
    }
}

impl RelayError {
    /// Short category name, used for metrics labels and terse diagnostics.
    pub fn category(&self) -> &'static str {
        match self {
            RelayError::Configuration(_) => "configuration",
            RelayError::Permission { .. } => "permission",
            RelayError::Request(_) => "request",
            RelayError::Transport(_) => "transport",
            RelayError::Protocol(_) => "protocol",
        }
    }

    /// Status code the hosting server answers with.
    pub fn status_code(&self) -> StatusCode {
        match self {
            RelayError::Configuration(_) => StatusCode::INTERNAL_SERVER_ERROR,
            RelayError::Permission { .. } => StatusCode::FORBIDDEN,
            RelayError::Request(RequestError::BodyTooLarge { .. }) => StatusCode::PAYLOAD_TOO_LARGE,
            RelayError::Request(_) => StatusCode::BAD_REQUEST,
            RelayError::Transport(TransportError::Timeout { .. }) => StatusCode::GATEWAY_TIMEOUT,
            RelayError::Transport(_) | RelayError::Protocol(_) => StatusCode::BAD_GATEWAY,
        }
    }

    /// Whether the caller, rather than the upstream, caused the failure.
    pub fn is_client_error(&self) -> bool {
        matches!(self, RelayError::Permission { .. } | RelayError::Request(_))
    }
}

/// Untrapped rendering: the status code and its canonical reason, nothing
/// about the failure itself.
impl IntoResponse for RelayError {
    fn into_response(self) -> Response {
        (&self).into_response()
    }
}

impl IntoResponse for &RelayError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        (status, status.canonical_reason().unwrap_or("Error")).into_response()
    }
}
