//! The relay pipeline.
//!
//! ```text
//! InboundRequest
//!     → PermissionGate (allow-list)
//!     → RequestContext (method, route, headers, cookies, body)
//!     → ForwardRequest (base address + route)
//!     → Transport (raw response bytes)
//!     → ResponseEnvelope (parsed)
//!     → ResponseEmitter (headers, then body)
//! ```
//!
//! Stages run strictly in order for one call. Any error ends the call.

use std::sync::Arc;
use std::time::Instant;

use axum::response::{IntoResponse, Response};

use crate::config::validation::validate_upstream;
use crate::config::{ErrorConfig, RelayConfig};
use crate::http::context::{ContextOptions, InboundRequest, RelayMethod, RequestContext};
use crate::http::emitter::{HttpResponseSink, ResponseEmitter};
use crate::http::forward::{ForwardOptions, ForwardRequest};
use crate::http::response::{parse_response, ResponseEnvelope};
use crate::observability::metrics;
use crate::relay::error::{RelayError, RelayResult};
use crate::security::PermissionGate;
use crate::transport::{select_transport, Transport};

/// A configured relay to one upstream.
pub struct Relay {
    upstream: String,
    gate: PermissionGate,
    trust_forwarded_for: bool,
    context_options: ContextOptions,
    forward_options: ForwardOptions,
    emitter: ResponseEmitter,
    errors: ErrorConfig,
    transport: Arc<dyn Transport>,
}

impl Relay {
    /// Build a relay, choosing the transport from the configuration.
    pub fn from_config(config: &RelayConfig) -> RelayResult<Self> {
        validate_upstream(&config.upstream.base_address)?;
        let transport = select_transport(&config.upstream, &config.timeouts)
            .map_err(|e| RelayError::Configuration(e.to_string()))?;
        Self::with_transport(config, transport)
    }

    /// Build a relay around an already chosen transport.
    pub fn with_transport(config: &RelayConfig, transport: Arc<dyn Transport>) -> RelayResult<Self> {
        validate_upstream(&config.upstream.base_address)?;

        Ok(Self {
            upstream: config.upstream.base_address.clone(),
            gate: PermissionGate::new(config.access.allowed_clients.clone()),
            trust_forwarded_for: config.access.trust_forwarded_for,
            context_options: ContextOptions {
                strict_user_agent: config.request.strict_user_agent,
                max_body_size: config.request.max_body_size,
                route_param: config.request.route_param.clone(),
            },
            forward_options: ForwardOptions {
                encode_cookies: config.request.encode_cookies,
            },
            emitter: ResponseEmitter::new(config.response.relay_status),
            errors: config.errors.clone(),
            transport,
        })
    }

    pub fn upstream(&self) -> &str {
        &self.upstream
    }

    pub fn transport_name(&self) -> &'static str {
        self.transport.name()
    }

    pub fn trusts_forwarded_for(&self) -> bool {
        self.trust_forwarded_for
    }

    /// Run every stage up to and including parsing.
    pub async fn execute(&self, inbound: &mut InboundRequest) -> RelayResult<ResponseEnvelope> {
        self.gate.authorize(&inbound.client_identity)?;

        let ctx = RequestContext::gather(inbound, &self.context_options).await?;
        let forward = ForwardRequest::build(&ctx, &self.upstream, &self.forward_options);

        let start = Instant::now();
        let raw = self.transport.send(&forward).await;
        metrics::record_upstream_duration(self.transport.name(), start);
        let raw = raw?;

        tracing::debug!(transport = self.transport.name(), bytes = raw.len(), "Upstream response received");

        Ok(parse_response(&raw)?)
    }

    /// Run the whole call and produce the response for the caller.
    pub async fn respond(&self, mut inbound: InboundRequest) -> Response {
        let method = method_label(&inbound.method);

        match self.execute(&mut inbound).await {
            Ok(envelope) => {
                tracing::info!(
                    method,
                    status = %envelope.status_line(),
                    headers = envelope.headers().len(),
                    body_len = envelope.body().len(),
                    "Relayed upstream response"
                );
                metrics::record_relay(method, "relayed");

                let mut sink = HttpResponseSink::new();
                self.emitter.emit(envelope, &mut sink);
                sink.into_response()
            }
            Err(error) => {
                metrics::record_relay(method, error.category());
                self.report(&error)
            }
        }
    }

    /// Turn a failure into the response the caller sees.
    pub fn report(&self, error: &RelayError) -> Response {
        if error.is_client_error() {
            tracing::warn!(category = error.category(), error = %error, "Relay call rejected");
        } else {
            tracing::error!(category = error.category(), error = %error, "Relay call failed");
        }
        metrics::record_failure(error.category());

        if !self.errors.trap_errors {
            return error.into_response();
        }

        let message = if self.errors.verbose {
            format!("Fatal relay error: {}", error)
        } else {
            format!("Fatal relay error: {}", error.category())
        };
        (error.status_code(), message).into_response()
    }
}

fn method_label(method: &str) -> &'static str {
    method
        .parse::<RelayMethod>()
        .map(|m| m.as_str())
        .unwrap_or("OTHER")
}
