//! HTTP header → RPC metadata forwarding.
//!
//! # Responsibilities
//! - Decide which incoming HTTP headers reach the RPC transport
//! - Rename headers that would otherwise clash with HTTP/2 semantics
//!
//! # Rules (case-insensitive, first match wins)
//! 1. The configured trace header is forwarded unchanged
//! 2. Headers starting with a configured prefix are forwarded unchanged
//! 3. `grpc-metadata-<key>` is forwarded as `<key>`
//! 4. Permanent HTTP headers are forwarded as `grpcgateway-<key>`
//! 5. Everything else is dropped

use axum::http::HeaderMap;
use tonic::metadata::{Ascii, MetadataKey, MetadataMap, MetadataValue};

const METADATA_HEADER_PREFIX: &str = "grpc-metadata-";
const METADATA_PREFIX: &str = "grpcgateway-";

const PERMANENT_HTTP_HEADERS: &[&str] = &[
    "accept",
    "accept-charset",
    "accept-language",
    "accept-ranges",
    "authorization",
    "cache-control",
    "content-type",
    "cookie",
    "date",
    "expect",
    "from",
    "host",
    "if-match",
    "if-modified-since",
    "if-none-match",
    "if-schedule-tag-match",
    "if-unmodified-since",
    "max-forwards",
    "origin",
    "pragma",
    "referer",
    "user-agent",
    "via",
    "warning",
];

#[derive(Debug, Clone)]
pub struct HeaderMatcher {
    trace_header: String,
    prefixes: Vec<String>,
}

impl HeaderMatcher {
    pub fn new<I, S>(prefixes: I, trace_header: &str) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            trace_header: trace_header.to_ascii_lowercase(),
            prefixes: prefixes
                .into_iter()
                .map(|p| p.as_ref().to_ascii_lowercase())
                .filter(|p| !p.is_empty())
                .collect(),
        }
    }

    /// Metadata key for an HTTP header, or `None` when it is not forwarded.
    pub fn matches(&self, header: &str) -> Option<String> {
        let key = header.to_ascii_lowercase();

        if key == self.trace_header {
            return Some(key);
        }
        if self.prefixes.iter().any(|p| key.starts_with(p.as_str())) {
            return Some(key);
        }
        if let Some(stripped) = key.strip_prefix(METADATA_HEADER_PREFIX) {
            return (!stripped.is_empty()).then(|| stripped.to_string());
        }
        if PERMANENT_HTTP_HEADERS.contains(&key.as_str()) {
            return Some(format!("{}{}", METADATA_PREFIX, key));
        }
        None
    }

    /// Forwardable headers as RPC metadata. Binary (`-bin`) keys and
    /// non-ASCII values are skipped.
    pub fn metadata(&self, headers: &HeaderMap) -> MetadataMap {
        let mut metadata = MetadataMap::new();
        for (name, value) in headers {
            let Some(key) = self.matches(name.as_str()) else {
                continue;
            };
            if key.ends_with("-bin") {
                continue;
            }
            let Ok(key) = MetadataKey::<Ascii>::from_bytes(key.as_bytes()) else {
                continue;
            };
            let Some(value) = value
                .to_str()
                .ok()
                .and_then(|v| MetadataValue::try_from(v).ok())
            else {
                continue;
            };
            metadata.append(key, value);
        }
        metadata
    }

    /// Wrap `message` in an RPC request carrying the forwarded headers.
    pub fn request<T>(&self, headers: &HeaderMap, message: T) -> tonic::Request<T> {
        let mut request = tonic::Request::new(message);
        *request.metadata_mut() = self.metadata(headers);
        request
    }
}

impl Default for HeaderMatcher {
    fn default() -> Self {
        Self::new(Vec::<String>::new(), "x-trace-id")
    }
}
