//! Replaying a parsed envelope to the caller.
//!
//! Every stored header value becomes its own header occurrence, then the
//! body is written verbatim. The status line is not a header and is never
//! replayed as one.

use axum::{
    body::{Body, Bytes},
    http::{HeaderName, HeaderValue, StatusCode},
    response::Response,
};

use crate::http::response::ResponseEnvelope;

/// Output channel to the original caller.
///
/// Headers must all be written before the body.
pub trait ResponseSink {
    fn status(&mut self, _status_line: &str) {}
    fn header(&mut self, name: &str, value: &str);
    fn body(&mut self, body: Bytes);
}

/// Replays envelopes onto a sink.
#[derive(Debug, Clone, Copy, Default)]
pub struct ResponseEmitter {
    relay_status: bool,
}

impl ResponseEmitter {
    pub fn new(relay_status: bool) -> Self {
        Self { relay_status }
    }

    pub fn emit(&self, envelope: ResponseEnvelope, sink: &mut impl ResponseSink) {
        let (status_line, headers, body) = envelope.into_parts();

        if self.relay_status {
            sink.status(&status_line);
        }

        for (name, value) in headers.occurrences() {
            sink.header(name, value);
        }

        sink.body(body);
    }
}

/// Builds an axum response from emitted parts.
#[derive(Default)]
pub struct HttpResponseSink {
    response: Response,
}

impl HttpResponseSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn into_response(self) -> Response {
        self.response
    }
}

impl ResponseSink for HttpResponseSink {
    fn status(&mut self, status_line: &str) {
        let code = status_line
            .split_whitespace()
            .nth(1)
            .and_then(|code| code.parse::<u16>().ok())
            .and_then(|code| StatusCode::from_u16(code).ok());

        match code {
            Some(status) => *self.response.status_mut() = status,
            None => tracing::warn!(status_line = %status_line, "Unusable upstream status line"),
        }
    }

    fn header(&mut self, name: &str, value: &str) {
        let name = match HeaderName::from_bytes(name.trim().as_bytes()) {
            Ok(name) => name,
            Err(_) => {
                tracing::warn!(header = %name, "Skipping header with illegal name");
                return;
            }
        };
        let value = match HeaderValue::from_str(value.trim()) {
            Ok(value) => value,
            Err(_) => {
                tracing::warn!(header = %name, "Skipping header with illegal value");
                return;
            }
        };
        self.response.headers_mut().append(name, value);
    }

    fn body(&mut self, body: Bytes) {
        *self.response.body_mut() = Body::from(body);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::response::parse_response;

    #[derive(Default)]
    struct RecordingSink {
        status: Option<String>,
        headers: Vec<(String, String)>,
        body: Vec<u8>,
    }

    impl ResponseSink for RecordingSink {
        fn status(&mut self, status_line: &str) {
            self.status = Some(status_line.to_string());
        }

        fn header(&mut self, name: &str, value: &str) {
            assert!(self.body.is_empty(), "header written after body");
            self.headers.push((name.to_string(), value.to_string()));
        }

        fn body(&mut self, body: Bytes) {
            self.body.extend_from_slice(&body);
        }
    }

    #[test]
    fn test_replay_matches_envelope() {
        let raw = b"HTTP/1.1 200 OK\r\nSet-Cookie: a=1\r\nContent-Type: text/plain\r\nSet-Cookie: b=2\r\nSet-Cookie: c=3\r\n\r\nhello\r\nworld";
        let envelope = parse_response(raw).unwrap();
        let expected: Vec<(String, String)> = envelope
            .headers()
            .occurrences()
            .map(|(n, v)| (n.to_string(), v.to_string()))
            .collect();

        let mut sink = RecordingSink::default();
        ResponseEmitter::default().emit(envelope, &mut sink);

        assert_eq!(sink.headers, expected);
        assert_eq!(sink.headers.iter().filter(|(n, _)| n == "Set-Cookie").count(), 3);
        assert_eq!(sink.body, b"hello\r\nworld");
        assert!(sink.status.is_none());
    }

    #[test]
    fn test_status_not_replayed_as_header() {
        let envelope = parse_response(b"HTTP/1.1 404 Not Found\nX-A: 1\n\n").unwrap();
        let mut sink = RecordingSink::default();
        ResponseEmitter::default().emit(envelope, &mut sink);

        assert_eq!(sink.headers, vec![("X-A".to_string(), " 1".to_string())]);
        assert!(sink.headers.iter().all(|(n, _)| n != "status"));
    }

    #[test]
    fn test_relay_status() {
        let envelope = parse_response(b"HTTP/1.1 404 Not Found\n\n").unwrap();
        let mut sink = RecordingSink::default();
        ResponseEmitter::new(true).emit(envelope, &mut sink);
        assert_eq!(sink.status.as_deref(), Some("HTTP/1.1 404 Not Found"));
    }

    #[test]
    fn test_http_sink() {
        let envelope = parse_response(
            b"HTTP/1.1 201 Created\r\nSet-Cookie: a=1\r\nSet-Cookie: b=2\r\nBad Name: x\r\nX-Id:  42 \r\n\r\n{}",
        )
        .unwrap();

        let mut sink = HttpResponseSink::new();
        ResponseEmitter::new(true).emit(envelope, &mut sink);
        let response = sink.into_response();

        assert_eq!(response.status(), StatusCode::CREATED);
        let cookies: Vec<_> = response
            .headers()
            .get_all("set-cookie")
            .iter()
            .map(|v| v.to_str().unwrap().to_string())
            .collect();
        assert_eq!(cookies, vec!["a=1", "b=2"]);
        assert_eq!(response.headers().get("x-id").unwrap(), "42");
        assert_eq!(response.headers().len(), 3);
    }

    #[test]
    fn test_http_sink_keeps_default_status() {
        let envelope = parse_response(b"HTTP/1.1 302 Found\r\nX-A: 1\r\n\r\n").unwrap();
        let mut sink = HttpResponseSink::new();
        ResponseEmitter::default().emit(envelope, &mut sink);
        assert_eq!(sink.into_response().status(), StatusCode::OK);
    }
}
