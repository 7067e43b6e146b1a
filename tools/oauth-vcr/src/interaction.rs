//! Canonical request/response values shared by the hook, the proxy client and
//! cassette collaborators.
//!
//! These types are deliberately independent of any transport's native return
//! shapes: a native client reports an info map, a raw header block and a raw
//! body, and [`Response::from_transport`] normalizes those into one value.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

pub type HeaderMap = BTreeMap<String, String>;
pub type InfoMap = BTreeMap<String, Value>;

/// Key under which native transports report the HTTP status in their info map.
pub const HTTP_CODE_INFO_KEY: &str = "http_code";

// ── Payload ───────────────────────────────────────────────────────────────────

/// Body-or-params of a signed fetch (the `extra_parameters` argument).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Payload {
    #[default]
    Empty,
    Fields(BTreeMap<String, String>),
    Raw(String),
}

impl Payload {
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Empty => true,
            Self::Fields(fields) => fields.is_empty(),
            Self::Raw(raw) => raw.is_empty(),
        }
    }
}

// ── Request ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Request {
    pub method: String,
    pub url: String,
    pub headers: HeaderMap,
    #[serde(default)]
    pub payload: Payload,
}

impl Request {
    /// Builds a request with an empty payload. The method is kept as given.
    pub fn new(method: impl Into<String>, url: impl Into<String>, headers: HeaderMap) -> Self {
        Self {
            method: method.into(),
            url: url.into(),
            headers,
            payload: Payload::Empty,
        }
    }

    pub fn with_payload(mut self, payload: Payload) -> Self {
        self.payload = payload;
        self
    }

    /// Stable SHA-256 digest of every field, hex encoded. The method is
    /// compared case-insensitively, so `get` and `GET` share a fingerprint.
    pub fn fingerprint(&self) -> String {
        use sha2::{Digest, Sha256};
        // BTreeMap serialization is ordered, so the rendering is deterministic.
        let method = self.method.to_ascii_uppercase();
        let rendered = serde_json::to_vec(&(&method, &self.url, &self.headers, &self.payload))
            .unwrap_or_default();
        hex_bytes(&Sha256::digest(&rendered))
    }
}

fn hex_bytes(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

// ── Response ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
    pub status_code: u16,
    pub headers: HeaderMap,
    pub body: String,
    /// Transport metadata (timings, content type, ...) as reported by the
    /// native client.
    #[serde(default)]
    pub info: InfoMap,
}

impl Response {
    pub fn new(status_code: u16, headers: HeaderMap, body: impl Into<String>) -> Self {
        Self {
            status_code,
            headers,
            body: body.into(),
            info: InfoMap::new(),
        }
    }

    pub fn with_info(mut self, info: InfoMap) -> Self {
        self.info = info;
        self
    }

    /// Normalizes a native transport's last-response triple.
    ///
    /// The status comes from the info map's `http_code`; when that is missing
    /// the leading `HTTP/x.y NNN` status line of the header block is used, and
    /// failing both the status is `0`.
    pub fn from_transport(info: InfoMap, raw_headers: &str, body: impl Into<String>) -> Self {
        let status_code = info
            .get(HTTP_CODE_INFO_KEY)
            .and_then(status_from_value)
            .or_else(|| status_from_status_line(raw_headers))
            .unwrap_or(0);
        Self {
            status_code,
            headers: parse_raw_headers(raw_headers),
            body: body.into(),
            info,
        }
    }

    /// Renders the header map as a CRLF header block terminated by a blank
    /// line. No status line is emitted.
    pub fn raw_headers(&self) -> String {
        let mut raw = String::new();
        for (key, value) in &self.headers {
            raw.push_str(key);
            raw.push_str(": ");
            raw.push_str(value);
            raw.push_str("\r\n");
        }
        raw.push_str("\r\n");
        raw
    }

    pub fn header(&self, key: &str) -> Option<&str> {
        self.headers.get(key).map(String::as_str)
    }
}

fn status_from_value(value: &Value) -> Option<u16> {
    match value {
        Value::Number(number) => number.as_u64().and_then(|n| u16::try_from(n).ok()),
        Value::String(text) => text.trim().parse().ok(),
        _ => None,
    }
}

fn status_from_status_line(raw_headers: &str) -> Option<u16> {
    let first = raw_headers.lines().map(str::trim).find(|line| !line.is_empty())?;
    let mut parts = first.split_whitespace();
    if !parts.next()?.to_ascii_uppercase().starts_with("HTTP/") {
        return None;
    }
    parts.next()?.parse().ok()
}

// ── Header parsing ────────────────────────────────────────────────────────────

/// Parses a raw CR/LF header block into a map.
///
/// Each non-empty line is split on its first `": "`. Lines without one (the
/// status line, garbage) are skipped. A repeated key keeps its last value, so
/// multi-valued headers such as `Set-Cookie` collapse to the final occurrence.
pub fn parse_raw_headers(raw: &str) -> HeaderMap {
    let mut headers = HeaderMap::new();
    for line in raw.split(['\r', '\n']) {
        if line.is_empty() {
            continue;
        }
        if let Some((key, value)) = line.split_once(": ") {
            headers.insert(key.to_string(), value.to_string());
        }
    }
    headers
}
