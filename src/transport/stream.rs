//! Minimal stream transport.
//!
//! Writes an HTTP/1.0 request over a fresh TCP connection and returns every
//! byte the upstream sends until it closes. HTTP/1.0 keeps the upstream
//! from answering with a chunked body, so the bytes can be relayed as-is.

use futures_util::future::BoxFuture;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use url::Url;

use crate::http::forward::ForwardRequest;
use crate::relay::error::TransportError;
use crate::resilience::{with_timeout, Deadlines};
use crate::transport::{parse_target, Transport};

/// Transport over a raw TCP stream.
#[derive(Debug, Clone)]
pub struct StreamTransport {
    deadlines: Deadlines,
}

impl StreamTransport {
    pub fn new(deadlines: Deadlines) -> Self {
        Self { deadlines }
    }

    pub fn supports(base: &Url) -> bool {
        base.scheme() == "http"
    }

    async fn execute(&self, request: &ForwardRequest) -> Result<Vec<u8>, TransportError> {
        let url = parse_target(request.url())?;
        let host = url.host_str().unwrap_or_default();
        let port = url.port_or_known_default().unwrap_or(80);
        let addr = format!("{}:{}", host, port);

        let mut stream = with_timeout("connect", self.deadlines.connect, async {
            TcpStream::connect(&addr)
                .await
                .map_err(|source| TransportError::Connect {
                    addr: addr.clone(),
                    source,
                })
        })
        .await?;

        tracing::debug!(addr = %addr, method = %request.method(), "Upstream stream opened");

        stream.write_all(request_head(request, &url).as_bytes()).await?;
        if let Some(body) = request.body() {
            stream.write_all(body).await?;
        }
        stream.flush().await?;

        let mut raw = Vec::new();
        stream.read_to_end(&mut raw).await?;

        tracing::debug!(addr = %addr, bytes = raw.len(), "Upstream stream drained");
        Ok(raw)
    }
}

impl Transport for StreamTransport {
    fn name(&self) -> &'static str {
        "stream"
    }

    fn send<'a>(&'a self, request: &'a ForwardRequest) -> BoxFuture<'a, Result<Vec<u8>, TransportError>> {
        Box::pin(with_timeout("request", self.deadlines.request, self.execute(request)))
    }
}

/// Request line and headers, through the blank line.
pub(crate) fn request_head(request: &ForwardRequest, url: &Url) -> String {
    let mut target = url.path().to_string();
    if let Some(query) = url.query() {
        target.push('?');
        target.push_str(query);
    }

    let host = url.host_str().unwrap_or_default();
    let host = match url.port() {
        Some(port) => format!("{}:{}", host, port),
        None => host.to_string(),
    };

    let mut head = format!("{} {} HTTP/1.0\r\nHost: {}\r\n", request.method(), target, host);
    for (name, value) in request.headers() {
        head.push_str(&format!("{}: {}\r\n", name, value));
    }
    if let Some(user_agent) = request.user_agent() {
        head.push_str(&format!("User-Agent: {}\r\n", user_agent));
    }
    if !request.cookie_header().is_empty() {
        head.push_str(&format!("Cookie: {}\r\n", request.cookie_header()));
    }
    if let Some(body) = request.body() {
        head.push_str(&format!("Content-Length: {}\r\n", body.len()));
    }
    head.push_str("Connection: close\r\n\r\n");
    head
}
