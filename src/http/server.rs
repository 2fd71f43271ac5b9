//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create the Axum router; every path and method reaches the relay handler
//! - Wire up middleware (request id, tracing)
//! - Body size is enforced by the current relay, so a reload changes it too
//! - Turn each call into an `InboundRequest` for the relay pipeline
//! - Swap in a new relay when the configuration file changes

use std::net::SocketAddr;
use std::sync::Arc;

use arc_swap::ArcSwap;
use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::{HeaderMap, Request},
    response::Response,
    routing::any,
    Router,
};
use tokio::net::TcpListener;
use tokio::sync::{broadcast, mpsc};
use tower::ServiceBuilder;
use tower_http::{
    request_id::{PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};
use tracing::Instrument;

use crate::config::RelayConfig;
use crate::http::context::{resolve_client_identity, InboundBody, InboundRequest};
use crate::http::request::{request_id, MakeRequestUuid};
use crate::relay::{Relay, RelayResult};

const X_FORWARDED_FOR: &str = "x-forwarded-for";

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub relay: Arc<ArcSwap<Relay>>,
}

/// HTTP server hosting the relay.
pub struct RelayServer {
    router: Router,
    relay: Arc<ArcSwap<Relay>>,
    config: RelayConfig,
}

impl RelayServer {
    /// Create a new server; fails when the relay cannot be built.
    pub fn new(config: RelayConfig) -> RelayResult<Self> {
        Ok(Self::with_relay(config.clone(), Relay::from_config(&config)?))
    }

    /// Create a server around an already built relay.
    pub fn with_relay(config: RelayConfig, relay: Relay) -> Self {
        let relay = Arc::new(ArcSwap::from_pointee(relay));
        let state = AppState {
            relay: relay.clone(),
        };
        let router = Self::build_router(state);

        Self {
            router,
            relay,
            config,
        }
    }

    /// Build the Axum router with all middleware layers.
    fn build_router(state: AppState) -> Router {
        Router::new()
            .route("/", any(relay_handler))
            .route("/{*path}", any(relay_handler))
            .with_state(state)
            .layer(
                ServiceBuilder::new()
                    .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
                    .layer(TraceLayer::new_for_http())
                    .layer(PropagateRequestIdLayer::x_request_id()),
            )
    }

    /// Run the server, accepting connections on the given listener.
    ///
    /// Configuration updates replace the relay between calls; calls in flight
    /// finish on the relay they started with.
    pub async fn run(
        self,
        listener: TcpListener,
        mut config_updates: mpsc::UnboundedReceiver<RelayConfig>,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            upstream = %self.relay.load().upstream(),
            transport = self.relay.load().transport_name(),
            "Relay server starting"
        );

        let relay = self.relay.clone();
        tokio::spawn(async move {
            while let Some(config) = config_updates.recv().await {
                match Relay::from_config(&config) {
                    Ok(next) => {
                        tracing::info!(upstream = %next.upstream(), "Relay reloaded");
                        relay.store(Arc::new(next));
                    }
                    Err(e) => {
                        tracing::error!(error = %e, "Rejected reloaded config, keeping current relay");
                    }
                }
            }
        });

        let app = self.router.into_make_service_with_connect_info::<SocketAddr>();

        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
            })
            .await?;

        tracing::info!("Relay server stopped");
        Ok(())
    }

    /// The relay currently serving calls.
    pub fn relay(&self) -> Arc<Relay> {
        self.relay.load_full()
    }

    pub fn config(&self) -> &RelayConfig {
        &self.config
    }
}

/// Relay handler: one call, one upstream round trip.
async fn relay_handler(
    State(state): State<AppState>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    request: Request<Body>,
) -> Response {
    let relay = state.relay.load_full();
    let (parts, body) = request.into_parts();

    let forwarded_for = parts
        .headers
        .get(X_FORWARDED_FOR)
        .and_then(|v| v.to_str().ok());

    let inbound = InboundRequest {
        method: parts.method.as_str().to_string(),
        query: parts.uri.query().map(str::to_string),
        headers: Some(header_pairs(&parts.headers)),
        client_identity: resolve_client_identity(peer.ip(), forwarded_for, relay.trusts_forwarded_for()),
        body: InboundBody::from_stream(body),
    };

    let span = tracing::info_span!(
        "relay",
        request_id = %request_id(&parts.headers),
        client = %inbound.client_identity,
        method = %parts.method,
    );

    relay.respond(inbound).instrument(span).await
}

fn header_pairs(headers: &HeaderMap) -> Vec<(String, String)> {
    headers
        .iter()
        .map(|(name, value)| {
            (
                name.as_str().to_string(),
                String::from_utf8_lossy(value.as_bytes()).into_owned(),
            )
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_header_pairs_keep_duplicates() {
        let mut headers = HeaderMap::new();
        headers.append("cookie", HeaderValue::from_static("a=1"));
        headers.append("cookie", HeaderValue::from_static("b=2"));
        headers.insert("user-agent", HeaderValue::from_static("test"));

        let pairs = header_pairs(&headers);
        assert_eq!(pairs.len(), 3);
        assert_eq!(pairs.iter().filter(|(n, _)| n == "cookie").count(), 2);
    }

    #[tokio::test]
    async fn test_new_rejects_missing_upstream() {
        assert!(RelayServer::new(RelayConfig::default()).is_err());
    }
}
