//! HTTP client transport.
//!
//! The client parses responses itself, so the raw stream is rebuilt from
//! what it exposes: one status line and the header lines of every hop,
//! joined by CRLF, then the blank line and the final body. Redirect hops
//! therefore show up as earlier status blocks that the response parser
//! discards.

use axum::{
    body::Body,
    http::{header, HeaderMap, Request, Response, StatusCode, Uri},
};
use futures_util::future::BoxFuture;
use hyper::body::Incoming;
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::TokioExecutor,
};
use url::Url;

use crate::http::context::RelayMethod;
use crate::http::forward::ForwardRequest;
use crate::relay::error::TransportError;
use crate::resilience::{with_timeout, Deadlines};
use crate::transport::{describe, parse_target, Transport};

/// Transport backed by the hyper client, with pooling disabled.
pub struct ClientTransport {
    client: Client<HttpConnector, Body>,
    deadlines: Deadlines,
    follow_redirects: bool,
    max_redirects: u32,
}

impl ClientTransport {
    pub fn new(deadlines: Deadlines, follow_redirects: bool, max_redirects: u32) -> Self {
        let mut connector = HttpConnector::new();
        connector.set_connect_timeout(Some(deadlines.connect));

        let client = Client::builder(TokioExecutor::new())
            .pool_max_idle_per_host(0)
            .build(connector);

        Self {
            client,
            deadlines,
            follow_redirects,
            max_redirects,
        }
    }

    /// Whether this strategy can reach the given upstream.
    pub fn supports(base: &Url) -> bool {
        base.scheme() == "http"
    }

    async fn execute(&self, request: &ForwardRequest) -> Result<Vec<u8>, TransportError> {
        let mut url = parse_target(request.url())?;
        let mut method = request.method();
        let mut body = request.body().cloned();
        let mut lines: Vec<String> = Vec::new();
        let mut hops = 0;

        loop {
            let outbound = build_request(request, method, &url, body.clone())?;
            let response = self.client.request(outbound).await.map_err(|e| {
                let message = describe(&e);
                if e.is_connect() {
                    TransportError::Connect {
                        addr: url.host_str().unwrap_or_default().to_string(),
                        source: std::io::Error::other(message),
                    }
                } else {
                    TransportError::Client(message)
                }
            })?;

            let status = response.status();
            lines.push(format!("{:?} {}", response.version(), status));
            lines.extend(header_lines(response.headers()));

            if self.follow_redirects && status.is_redirection() && hops < self.max_redirects {
                if let Some(next) = redirect_target(response.headers(), &url) {
                    hops += 1;
                    if status == StatusCode::SEE_OTHER
                        || (method == RelayMethod::Post
                            && (status == StatusCode::MOVED_PERMANENTLY || status == StatusCode::FOUND))
                    {
                        method = RelayMethod::Get;
                        body = None;
                    }
                    tracing::debug!(status = %status, location = %next, hop = hops, "Following redirect");
                    url = next;
                    continue;
                }
            }

            let payload = read_body(response).await?;

            let mut raw = lines.join("\r\n").into_bytes();
            raw.extend_from_slice(b"\r\n\r\n");
            raw.extend_from_slice(&payload);
            return Ok(raw);
        }
    }
}

impl Transport for ClientTransport {
    fn name(&self) -> &'static str {
        "client"
    }

    fn send<'a>(&'a self, request: &'a ForwardRequest) -> BoxFuture<'a, Result<Vec<u8>, TransportError>> {
        Box::pin(with_timeout("request", self.deadlines.request, self.execute(request)))
    }
}

fn build_request(
    request: &ForwardRequest,
    method: RelayMethod,
    url: &Url,
    body: Option<axum::body::Bytes>,
) -> Result<Request<Body>, TransportError> {
    let uri: Uri = url.as_str().parse().map_err(|e: axum::http::uri::InvalidUri| {
        TransportError::InvalidUrl {
            url: url.to_string(),
            reason: e.to_string(),
        }
    })?;

    let mut builder = Request::builder().method(method).uri(uri);

    for (name, value) in request.headers() {
        builder = builder.header(name.as_str(), value.as_str());
    }
    if let Some(user_agent) = request.user_agent() {
        builder = builder.header(header::USER_AGENT, user_agent);
    }
    if !request.cookie_header().is_empty() {
        builder = builder.header(header::COOKIE, request.cookie_header());
    }

    let body = match body {
        Some(bytes) if method.carries_body() => Body::from(bytes),
        _ => Body::empty(),
    };

    builder
        .body(body)
        .map_err(|e| TransportError::Client(describe(&e)))
}

fn header_lines(headers: &HeaderMap) -> impl Iterator<Item = String> + '_ {
    headers
        .iter()
        .map(|(name, value)| format!("{}: {}", name, String::from_utf8_lossy(value.as_bytes())))
}

fn redirect_target(headers: &HeaderMap, current: &Url) -> Option<Url> {
    let location = headers.get(header::LOCATION)?.to_str().ok()?;
    let next = current.join(location).ok()?;
    (next.scheme() == "http").then_some(next)
}

async fn read_body(response: Response<Incoming>) -> Result<axum::body::Bytes, TransportError> {
    axum::body::to_bytes(Body::new(response.into_body()), usize::MAX)
        .await
        .map_err(|e| TransportError::Client(describe(&e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_request_headers() {
        let forward = ForwardRequest::new(RelayMethod::Post, "http://api.internal/a?b=1")
            .with_header("Content-Type", "application/json")
            .with_user_agent("agent/2")
            .with_cookie_header("a=1; b=2")
            .with_body("{}");
        let url = parse_target(forward.url()).unwrap();

        let req = build_request(&forward, forward.method(), &url, forward.body().cloned()).unwrap();
        assert_eq!(req.method(), "POST");
        assert_eq!(req.uri(), "http://api.internal/a?b=1");
        assert_eq!(req.headers()["content-type"], "application/json");
        assert_eq!(req.headers()["user-agent"], "agent/2");
        assert_eq!(req.headers()["cookie"], "a=1; b=2");
    }

    #[test]
    fn test_build_request_without_cookies() {
        let forward = ForwardRequest::new(RelayMethod::Get, "http://api.internal/");
        let url = parse_target(forward.url()).unwrap();
        let req = build_request(&forward, forward.method(), &url, None).unwrap();
        assert!(req.headers().get("cookie").is_none());
        assert!(req.headers().get("user-agent").is_none());
    }

    #[test]
    fn test_redirect_target() {
        let current = Url::parse("http://api.internal/a/b").unwrap();
        let mut headers = HeaderMap::new();
        headers.insert(header::LOCATION, "/login".parse().unwrap());
        assert_eq!(
            redirect_target(&headers, &current).unwrap().as_str(),
            "http://api.internal/login"
        );

        headers.insert(header::LOCATION, "https://secure.internal/".parse().unwrap());
        assert!(redirect_target(&headers, &current).is_none());

        assert!(redirect_target(&HeaderMap::new(), &current).is_none());
    }

    #[test]
    fn test_header_lines() {
        let mut headers = HeaderMap::new();
        headers.append(header::SET_COOKIE, "a=1".parse().unwrap());
        headers.append(header::SET_COOKIE, "b=2".parse().unwrap());
        let lines: Vec<_> = header_lines(&headers).collect();
        assert_eq!(lines, vec!["set-cookie: a=1", "set-cookie: b=2"]);
    }
}
