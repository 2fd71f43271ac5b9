//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the relay.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

/// Root configuration for the relay.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct RelayConfig {
    /// Listener configuration (bind address).
    pub listener: ListenerConfig,

    /// The single upstream host every request is forwarded to.
    pub upstream: UpstreamConfig,

    /// Timeout configuration for the transport.
    pub timeouts: TimeoutConfig,

    /// Client allow-list.
    pub access: AccessConfig,

    /// Inbound request handling.
    pub request: RequestConfig,

    /// Outbound response handling.
    pub response: ResponseConfig,

    /// How failures are reported to the caller.
    pub errors: ErrorConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
        }
    }
}

/// Which transport strategy carries requests upstream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum TransportKind {
    /// Inspect the upstream address and pick the best strategy for it.
    #[default]
    Auto,
    /// Full HTTP client.
    Client,
    /// Minimal TCP stream.
    Stream,
}

/// Upstream configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct UpstreamConfig {
    /// Base address the route is appended to (e.g., "http://api.internal").
    /// Must not end in a trailing slash.
    pub base_address: String,

    /// Transport strategy.
    pub transport: TransportKind,

    /// Follow 3xx responses inside the client transport.
    pub follow_redirects: bool,

    /// Maximum number of redirects followed per call.
    pub max_redirects: u32,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            base_address: String::new(),
            transport: TransportKind::Auto,
            follow_redirects: true,
            max_redirects: 5,
        }
    }
}

/// Timeout configuration for upstream calls.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Connection establishment timeout in seconds.
    pub connect_secs: u64,

    /// Request timeout (total time for request/response) in seconds.
    pub request_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            connect_secs: 5,
            request_secs: 30,
        }
    }
}

/// Client access configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct AccessConfig {
    /// Hostnames or addresses allowed to use the relay. `None` allows everyone.
    pub allowed_clients: Option<Vec<String>>,

    /// Take the client identity from the first `X-Forwarded-For` entry.
    pub trust_forwarded_for: bool,
}

/// Inbound request configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RequestConfig {
    /// Reject requests that carry no `User-Agent`.
    pub strict_user_agent: bool,

    /// Percent-encode cookie values when rebuilding the `Cookie` header.
    pub encode_cookies: bool,

    /// Maximum inbound body size in bytes.
    pub max_body_size: usize,

    /// Query parameter carrying the upstream path.
    pub route_param: String,
}

impl Default for RequestConfig {
    fn default() -> Self {
        Self {
            strict_user_agent: true,
            encode_cookies: true,
            max_body_size: 2 * 1024 * 1024, // 2MB
            route_param: "route".to_string(),
        }
    }
}

/// Outbound response configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ResponseConfig {
    /// Also relay the upstream status code, not just headers and body.
    pub relay_status: bool,
}

/// Error reporting configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ErrorConfig {
    /// Report failures as a plain-text diagnostic written by the relay itself.
    pub trap_errors: bool,

    /// Include the full error message in trapped diagnostics.
    pub verbose: bool,
}

impl Default for ErrorConfig {
    fn default() -> Self {
        Self {
            trap_errors: true,
            verbose: true,
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Log output format.
    pub log_format: LogFormat,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_config_uses_defaults() {
        let config: RelayConfig = toml::from_str(
            r#"
            [upstream]
            base_address = "http://api.internal"
            "#,
        )
        .unwrap();

        assert_eq!(config.upstream.base_address, "http://api.internal");
        assert_eq!(config.upstream.transport, TransportKind::Auto);
        assert!(config.request.strict_user_agent);
        assert!(config.request.encode_cookies);
        assert_eq!(config.request.route_param, "route");
        assert!(config.access.allowed_clients.is_none());
        assert!(config.errors.trap_errors);
    }

    #[test]
    fn test_full_config() {
        let config: RelayConfig = toml::from_str(
            r#"
            [listener]
            bind_address = "127.0.0.1:9000"

            [upstream]
            base_address = "http://login.example.com"
            transport = "stream"
            follow_redirects = false

            [access]
            allowed_clients = ["10.0.0.1", "gateway.local"]

            [request]
            strict_user_agent = false
            encode_cookies = false

            [observability]
            log_format = "json"
            "#,
        )
        .unwrap();

        assert_eq!(config.listener.bind_address, "127.0.0.1:9000");
        assert_eq!(config.upstream.transport, TransportKind::Stream);
        assert!(!config.upstream.follow_redirects);
        assert_eq!(
            config.access.allowed_clients,
            Some(vec!["10.0.0.1".to_string(), "gateway.local".to_string()])
        );
        assert!(!config.request.strict_user_agent);
        assert_eq!(config.observability.log_format, LogFormat::Json);
    }
}
