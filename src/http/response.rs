//! Raw upstream response parsing.
//!
//! # Responsibilities
//! - Find the header/body boundary in a raw response byte stream
//! - Drop 1xx and 3xx status blocks superseded by a later well-formed
//!   status line (followed redirects, interim `100 Continue` answers)
//! - Split the retained header block into a status line and an ordered
//!   multimap of headers
//! - Hand back the body bytes untouched
//!
//! # Design Decisions
//! - Both `\r\n\r\n` and `\n\n` end a header block; whichever occurs
//!   first in the stream is the real boundary
//! - No chunked decoding and no Content-Length enforcement: the body is
//!   passed through verbatim
//! - Header names and values are not trimmed or case-folded

use axum::body::Bytes;

use crate::relay::error::ProtocolError;

/// Prefix every HTTP status line starts with.
pub const STATUS_PREFIX: &str = "HTTP/";

const CRLF_SEPARATOR: &[u8] = b"\r\n\r\n";
const LF_SEPARATOR: &[u8] = b"\n\n";

/// Header names mapped to every value received for them, in arrival order.
///
/// Names are kept in order of first appearance; repeated names append.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HeaderMultimap {
    entries: Vec<(String, Vec<String>)>,
}

impl HeaderMultimap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(n, _)| *n == name) {
            Some((_, values)) => values.push(value),
            None => self.entries.push((name, vec![value])),
        }
    }

    /// All values stored under exactly `name`.
    pub fn get_all(&self, name: &str) -> &[String] {
        self.entries
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, values)| values.as_slice())
            .unwrap_or(&[])
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.entries
            .iter()
            .map(|(name, values)| (name.as_str(), values.as_slice()))
    }

    /// Every `(name, value)` occurrence, grouped by name.
    pub fn occurrences(&self) -> impl Iterator<Item = (&str, &str)> {
        self.iter()
            .flat_map(|(name, values)| values.iter().map(move |v| (name, v.as_str())))
    }

    /// Number of distinct names.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Structured result of parsing one raw upstream response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseEnvelope {
    status_line: String,
    headers: HeaderMultimap,
    body: Bytes,
}

impl ResponseEnvelope {
    pub fn new(status_line: impl Into<String>, headers: HeaderMultimap, body: impl Into<Bytes>) -> Self {
        Self {
            status_line: status_line.into(),
            headers,
            body: body.into(),
        }
    }

    /// First line of the last status block.
    pub fn status_line(&self) -> &str {
        &self.status_line
    }

    /// Numeric status code from the status line, if it has one.
    pub fn status_code(&self) -> Option<u16> {
        self.status_line
            .split_whitespace()
            .nth(1)
            .and_then(|code| code.parse().ok())
    }

    /// Replayable headers. The status line is never part of this map.
    pub fn headers(&self) -> &HeaderMultimap {
        &self.headers
    }

    pub fn body(&self) -> &Bytes {
        &self.body
    }

    pub fn into_parts(self) -> (String, HeaderMultimap, Bytes) {
        (self.status_line, self.headers, self.body)
    }
}

/// Locate the earliest header/body separator.
///
/// Returns the separator's offset and length.
pub fn find_separator(raw: &[u8]) -> Option<(usize, usize)> {
    let crlf = find(raw, CRLF_SEPARATOR);
    let lf = find(raw, LF_SEPARATOR);

    match (crlf, lf) {
        (Some(c), Some(l)) if c < l => Some((c, CRLF_SEPARATOR.len())),
        (_, Some(l)) => Some((l, LF_SEPARATOR.len())),
        (Some(c), None) => Some((c, CRLF_SEPARATOR.len())),
        (None, None) => None,
    }
}

/// Parse a raw upstream response into an envelope.
pub fn parse_response(raw: &[u8]) -> Result<ResponseEnvelope, ProtocolError> {
    let mut start = 0;

    let (header_block, body) = loop {
        let rest = &raw[start..];
        match find_separator(rest) {
            Some((offset, len)) => {
                let body_start = start + offset + len;
                // An interim or redirect block is superseded by a status block
                // right after its boundary; any other body is kept verbatim.
                if is_interim_or_redirect(&rest[..offset]) && starts_with_status_line(&raw[body_start..]) {
                    tracing::trace!(offset = body_start, "Skipping superseded status block");
                    start = body_start;
                    continue;
                }
                break (&rest[..offset], &raw[body_start..]);
            }
            None if rest.starts_with(STATUS_PREFIX.as_bytes()) => break (rest, &raw[raw.len()..]),
            None => return Err(ProtocolError::NoValidResponse),
        }
    };

    let text = String::from_utf8_lossy(header_block).replace('\r', "");
    let lines: Vec<&str> = text.split('\n').collect();
    let lines = strip_superseded_blocks(&lines);

    let mut status_line = None;
    let mut headers = HeaderMultimap::new();

    for line in lines {
        if line.is_empty() {
            continue;
        }
        if status_line.is_none() && (line.starts_with(STATUS_PREFIX) || !line.contains(':')) {
            status_line = Some(line.to_string());
            continue;
        }
        match line.split_once(':') {
            Some((name, value)) => headers.append(name, value),
            None => tracing::debug!(line = %line, "Ignoring malformed header line"),
        }
    }

    let status_line = status_line.ok_or(ProtocolError::MissingStatusLine)?;

    tracing::debug!(
        status = %status_line,
        headers = headers.len(),
        body_len = body.len(),
        "Upstream response parsed"
    );

    Ok(ResponseEnvelope {
        status_line,
        headers,
        body: Bytes::copy_from_slice(body),
    })
}

/// Keep only the lines from the last status line onward.
///
/// A single status line leaves the block unchanged.
pub fn strip_superseded_blocks<'a>(lines: &'a [&'a str]) -> &'a [&'a str] {
    let last_status = lines
        .iter()
        .rposition(|line| status_line_code(line).is_some())
        .unwrap_or(0);
    &lines[last_status..]
}

/// Code of a well-formed status line: `HTTP/<major>[.<minor>] <3 digits>`,
/// followed by the end of the line or a reason phrase.
pub fn status_line_code(line: &str) -> Option<u16> {
    let rest = line.strip_prefix(STATUS_PREFIX)?;
    let (version, rest) = rest.split_once(' ')?;

    let digits = |s: &str| !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit());
    let version_ok = match version.split_once('.') {
        Some((major, minor)) => digits(major) && digits(minor),
        None => digits(version),
    };
    if !version_ok {
        return None;
    }

    let code = rest.get(..3).filter(|code| digits(code))?;
    match rest.as_bytes().get(3) {
        None | Some(b' ') | Some(b'\r') => code.parse().ok(),
        Some(_) => None,
    }
}

/// Whether the last status line of a header block is 1xx or 3xx.
fn is_interim_or_redirect(header_block: &[u8]) -> bool {
    let code = String::from_utf8_lossy(header_block)
        .lines()
        .filter_map(|line| status_line_code(line.trim_end_matches('\r')))
        .last();
    matches!(code, Some(100..=199) | Some(300..=399))
}

fn starts_with_status_line(bytes: &[u8]) -> bool {
    let end = bytes.iter().position(|&b| b == b'\n').unwrap_or(bytes.len());
    let line = String::from_utf8_lossy(&bytes[..end]);
    status_line_code(line.trim_end_matches('\r')).is_some()
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}
