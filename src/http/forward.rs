//! Outbound request construction.
//!
//! # Responsibilities
//! - Concatenate the upstream base address and the caller's route
//! - Propagate Content-Type, User-Agent and cookies; drop every other header
//! - Carry the body for POST/PUT only
//!
//! # Design Decisions
//! - No URL normalization or validation here; a malformed URL surfaces
//!   as a transport error
//! - Cookie values are form-encoded by default so `;` or `=` inside a
//!   value cannot corrupt the `Cookie` header

use axum::body::Bytes;
use url::form_urlencoded;

use crate::http::context::{CookieJar, RelayMethod, RequestContext};

/// Options that shape the outbound request.
#[derive(Debug, Clone)]
pub struct ForwardOptions {
    pub encode_cookies: bool,
}

impl Default for ForwardOptions {
    fn default() -> Self {
        Self { encode_cookies: true }
    }
}

/// Request descriptor handed to a transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForwardRequest {
    method: RelayMethod,
    url: String,
    headers: Vec<(String, String)>,
    cookie_header: String,
    user_agent: Option<String>,
    body: Option<Bytes>,
}

impl ForwardRequest {
    /// Translate a request context into the request sent upstream.
    pub fn build(ctx: &RequestContext, base_address: &str, options: &ForwardOptions) -> Self {
        let url = format!("{}{}", base_address, ctx.route());

        let mut headers = Vec::new();
        if let Some(content_type) = ctx.content_type().filter(|ct| !ct.is_empty()) {
            headers.push(("Content-Type".to_string(), content_type.to_string()));
        }

        let body = if ctx.method().carries_body() {
            ctx.body().cloned()
        } else {
            None
        };

        let request = Self {
            method: ctx.method(),
            url,
            headers,
            cookie_header: serialize_cookies(ctx.cookies(), options.encode_cookies),
            user_agent: Some(ctx.user_agent().to_string()).filter(|ua| !ua.is_empty()),
            body,
        };

        tracing::debug!(
            method = %request.method,
            url = %request.url,
            has_body = request.body.is_some(),
            "Forward request built"
        );

        request
    }

    /// Bare request, mostly for driving transports directly.
    pub fn new(method: RelayMethod, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            headers: Vec::new(),
            cookie_header: String::new(),
            user_agent: None,
            body: None,
        }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn with_cookie_header(mut self, cookie_header: impl Into<String>) -> Self {
        self.cookie_header = cookie_header.into();
        self
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = Some(user_agent.into());
        self
    }

    /// Ignored unless the method is POST or PUT.
    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        if self.method.carries_body() {
            self.body = Some(body.into());
        }
        self
    }

    pub fn method(&self) -> RelayMethod {
        self.method
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn headers(&self) -> &[(String, String)] {
        &self.headers
    }

    /// Serialized `Cookie` header value; empty when the caller sent no cookies.
    pub fn cookie_header(&self) -> &str {
        &self.cookie_header
    }

    pub fn user_agent(&self) -> Option<&str> {
        self.user_agent.as_deref()
    }

    pub fn body(&self) -> Option<&Bytes> {
        self.body.as_ref()
    }
}

/// Serialize cookies as `name=value` pairs joined by `; `, in jar order.
pub fn serialize_cookies(jar: &CookieJar, encode: bool) -> String {
    jar.iter()
        .map(|(name, value)| {
            if encode {
                format!("{}={}", name, encode_cookie_value(value))
            } else {
                format!("{}={}", name, value)
            }
        })
        .collect::<Vec<_>>()
        .join("; ")
}

/// Percent-decode then form-encode, so an already encoded value is not encoded twice.
fn encode_cookie_value(value: &str) -> String {
    let decoded = decode_component(value);
    form_urlencoded::byte_serialize(decoded.as_bytes()).collect()
}

fn decode_component(value: &str) -> String {
    let escaped = value.replace('&', "%26");
    form_urlencoded::parse(format!("v={}", escaped).as_bytes())
        .next()
        .map(|(_, v)| v.into_owned())
        .unwrap_or_default()
}
