//! Inbound request snapshot.
//!
//! # Responsibilities
//! - Resolve the method, route, headers, cookies and user agent of one call
//! - Read the body once (POST/PUT only) and cache it
//! - Freeze everything into an immutable `RequestContext`
//!
//! # Design Decisions
//! - The hosting server hands over transport-level metadata as an
//!   `InboundRequest`; nothing here looks at ambient server state
//! - Header names keep the case the server supplied; lookups are
//!   case-insensitive

use std::fmt;
use std::net::IpAddr;
use std::str::FromStr;

use axum::body::{Body, Bytes};
use axum::http::Method;
use futures_util::StreamExt;
use url::form_urlencoded;

use crate::relay::error::RequestError;

/// Methods the relay forwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RelayMethod {
    Get,
    Post,
    Put,
    Delete,
}

impl RelayMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            RelayMethod::Get => "GET",
            RelayMethod::Post => "POST",
            RelayMethod::Put => "PUT",
            RelayMethod::Delete => "DELETE",
        }
    }

    /// Only POST and PUT carry a body upstream.
    pub fn carries_body(&self) -> bool {
        matches!(self, RelayMethod::Post | RelayMethod::Put)
    }
}

impl FromStr for RelayMethod {
    type Err = RequestError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.to_ascii_lowercase();
        match lower.as_str() {
            "get" => Ok(RelayMethod::Get),
            "post" => Ok(RelayMethod::Post),
            "put" => Ok(RelayMethod::Put),
            "delete" => Ok(RelayMethod::Delete),
            _ => Err(RequestError::InvalidMethod(lower)),
        }
    }
}

impl From<RelayMethod> for Method {
    fn from(method: RelayMethod) -> Self {
        match method {
            RelayMethod::Get => Method::GET,
            RelayMethod::Post => Method::POST,
            RelayMethod::Put => Method::PUT,
            RelayMethod::Delete => Method::DELETE,
        }
    }
}

impl fmt::Display for RelayMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Inbound body that is read from its source at most once.
///
/// The source stream is single-read; every later `read` returns the outcome
/// of the first one, bytes or error.
pub struct InboundBody {
    state: BodyState,
}

enum BodyState {
    Pending(Body),
    Read(Bytes),
    Failed(RequestError),
}

impl Default for InboundBody {
    fn default() -> Self {
        Self {
            state: BodyState::Read(Bytes::new()),
        }
    }
}

impl fmt::Debug for InboundBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.state {
            BodyState::Pending(_) => f.write_str("InboundBody::Pending"),
            BodyState::Read(bytes) => write!(f, "InboundBody::Read({} bytes)", bytes.len()),
            BodyState::Failed(e) => write!(f, "InboundBody::Failed({})", e),
        }
    }
}

impl InboundBody {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn from_stream(body: Body) -> Self {
        Self {
            state: BodyState::Pending(body),
        }
    }

    pub fn from_bytes(bytes: impl Into<Bytes>) -> Self {
        Self {
            state: BodyState::Read(bytes.into()),
        }
    }

    /// Read the whole body, failing once it grows past `limit` bytes.
    pub async fn read(&mut self, limit: usize) -> Result<Bytes, RequestError> {
        let body = match &mut self.state {
            BodyState::Read(bytes) => return Ok(bytes.clone()),
            BodyState::Failed(error) => return Err(error.clone()),
            BodyState::Pending(body) => std::mem::take(body),
        };

        let result = collect_body(body, limit).await;
        self.state = match &result {
            Ok(bytes) => BodyState::Read(bytes.clone()),
            Err(error) => BodyState::Failed(error.clone()),
        };
        result
    }
}

async fn collect_body(body: Body, limit: usize) -> Result<Bytes, RequestError> {
    let mut stream = body.into_data_stream();
    let mut collected = Vec::new();

    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(|e| RequestError::BodyUnreadable(e.to_string()))?;
        if collected.len() + chunk.len() > limit {
            return Err(RequestError::BodyTooLarge { limit });
        }
        collected.extend_from_slice(&chunk);
    }

    Ok(Bytes::from(collected))
}

/// Transport-level metadata of one inbound call, as supplied by the hosting server.
#[derive(Debug)]
pub struct InboundRequest {
    /// Method token as received.
    pub method: String,
    /// Raw query string, without the leading `?`.
    pub query: Option<String>,
    /// Full raw header view. `None` when the server cannot provide one.
    pub headers: Option<Vec<(String, String)>>,
    /// Resolved caller identity (hostname or address).
    pub client_identity: String,
    pub body: InboundBody,
}

/// Resolve the caller identity from the peer address.
///
/// With `trust_forwarded_for`, the first `X-Forwarded-For` hop wins when present.
pub fn resolve_client_identity(
    peer: IpAddr,
    forwarded_for: Option<&str>,
    trust_forwarded_for: bool,
) -> String {
    if trust_forwarded_for {
        if let Some(first) = forwarded_for
            .and_then(|v| v.split(',').next())
            .map(str::trim)
            .filter(|v| !v.is_empty())
        {
            return first.to_string();
        }
    }
    peer.to_string()
}

/// Cookies sent by the caller, in the order they were received.
///
/// The first occurrence of a name wins.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CookieJar {
    entries: Vec<(String, String)>,
}

impl CookieJar {
    /// Parse one or more `Cookie` header values.
    pub fn parse<'a>(header_values: impl IntoIterator<Item = &'a str>) -> Self {
        let mut jar = CookieJar::default();
        for value in header_values {
            for pair in value.split(';') {
                let Some((name, value)) = pair.split_once('=') else { continue };
                let name = name.trim();
                if name.is_empty() {
                    continue;
                }
                jar.insert(name, value.trim());
            }
        }
        jar
    }

    pub fn insert(&mut self, name: &str, value: &str) {
        if self.get(name).is_none() {
            self.entries.push((name.to_string(), value.to_string()));
        }
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(n, v)| (n.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// How strictly a context is gathered.
#[derive(Debug, Clone)]
pub struct ContextOptions {
    /// Fail with `MissingUserAgent` instead of tolerating an empty one.
    pub strict_user_agent: bool,
    pub max_body_size: usize,
    pub route_param: String,
}

impl Default for ContextOptions {
    fn default() -> Self {
        Self {
            strict_user_agent: true,
            max_body_size: 2 * 1024 * 1024,
            route_param: "route".to_string(),
        }
    }
}

/// Immutable snapshot of one inbound call.
#[derive(Debug, Clone)]
pub struct RequestContext {
    method: RelayMethod,
    route: String,
    headers: Vec<(String, String)>,
    cookies: CookieJar,
    content_type: Option<String>,
    user_agent: String,
    body: Option<Bytes>,
    client_identity: String,
}

impl RequestContext {
    /// Gather a context from the inbound call.
    pub async fn gather(
        inbound: &mut InboundRequest,
        options: &ContextOptions,
    ) -> Result<Self, RequestError> {
        let method: RelayMethod = inbound.method.parse()?;

        let headers = inbound
            .headers
            .clone()
            .ok_or(RequestError::HeadersUnavailable)?;

        let cookies = CookieJar::parse(
            headers
                .iter()
                .filter(|(name, _)| name.eq_ignore_ascii_case("cookie"))
                .map(|(_, value)| value.as_str()),
        );

        let user_agent = match find_header(&headers, "user-agent") {
            Some(ua) => ua.to_string(),
            None if options.strict_user_agent => return Err(RequestError::MissingUserAgent),
            None => String::new(),
        };

        let content_type = find_header(&headers, "content-type").map(str::to_string);

        let route = inbound
            .query
            .as_deref()
            .and_then(|query| {
                form_urlencoded::parse(query.as_bytes())
                    .find(|(key, _)| key == options.route_param.as_str())
                    .map(|(_, value)| value.into_owned())
            })
            .ok_or_else(|| RequestError::MissingRoute(options.route_param.clone()))?;

        let body = if method.carries_body() {
            Some(inbound.body.read(options.max_body_size).await?)
        } else {
            None
        };

        tracing::debug!(
            method = %method,
            route = %route,
            cookies = cookies.len(),
            body_len = body.as_ref().map(|b| b.len()).unwrap_or(0),
            "Request context gathered"
        );

        Ok(Self {
            method,
            route,
            headers,
            cookies,
            content_type,
            user_agent,
            body,
            client_identity: inbound.client_identity.clone(),
        })
    }

    pub fn method(&self) -> RelayMethod {
        self.method
    }

    pub fn route(&self) -> &str {
        &self.route
    }

    pub fn headers(&self) -> &[(String, String)] {
        &self.headers
    }

    /// First header with the given name, ignoring case.
    pub fn header(&self, name: &str) -> Option<&str> {
        find_header(&self.headers, name)
    }

    pub fn cookies(&self) -> &CookieJar {
        &self.cookies
    }

    pub fn content_type(&self) -> Option<&str> {
        self.content_type.as_deref()
    }

    /// Empty when the caller sent none and the context was gathered leniently.
    pub fn user_agent(&self) -> &str {
        &self.user_agent
    }

    /// Present only for POST and PUT.
    pub fn body(&self) -> Option<&Bytes> {
        self.body.as_ref()
    }

    pub fn client_identity(&self) -> &str {
        &self.client_identity
    }
}

fn find_header<'a>(headers: &'a [(String, String)], name: &str) -> Option<&'a str> {
    headers
        .iter()
        .find(|(n, _)| n.eq_ignore_ascii_case(name))
        .map(|(_, v)| v.as_str())
}
