//! HTTP plumbing shared by the client and its transports.
//!
//! # Design
//! The client never talks to the network itself. It hands a method, a target
//! and the current `OptionSet` to a `Transport`, and gets back an
//! `HttpResponse` described as plain data. `UreqTransport` is the default
//! implementation; tests substitute their own.

use std::borrow::Cow;
use std::fmt;

use crate::error::TransportError;
use crate::options::OptionSet;

/// HTTP method accepted by the request client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Delete,
}

impl HttpMethod {
    /// Parse a method name. Matching is exact and case-sensitive, so `"get"`
    /// and `"PATCH"` are both rejected.
    pub fn parse(method: &str) -> Option<Self> {
        match method {
            "GET" => Some(HttpMethod::Get),
            "POST" => Some(HttpMethod::Post),
            "PUT" => Some(HttpMethod::Put),
            "DELETE" => Some(HttpMethod::Delete),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Delete => "DELETE",
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An HTTP response described as plain data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl HttpResponse {
    pub fn new(status: u16, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            headers: Vec::new(),
            body: body.into(),
        }
    }

    pub fn status_code(&self) -> u16 {
        self.status
    }

    pub fn body_bytes(&self) -> &[u8] {
        &self.body
    }

    /// Body as text, replacing invalid UTF-8 sequences.
    pub fn text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.body)
    }

    /// First header with the given name, compared case-insensitively.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

/// Performs the actual network exchange for a `RequestClient`.
///
/// Implementations read whatever option keys they understand from the
/// `OptionSet` and ignore the rest.
pub trait Transport {
    /// Toggle TLS certificate verification. Called once while the client is
    /// being constructed.
    fn set_verification(&mut self, verify: bool);

    fn request(
        &self,
        method: HttpMethod,
        target: &str,
        options: &OptionSet,
    ) -> Result<HttpResponse, TransportError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_accepts_exact_uppercase_names() {
        assert_eq!(HttpMethod::parse("GET"), Some(HttpMethod::Get));
        assert_eq!(HttpMethod::parse("POST"), Some(HttpMethod::Post));
        assert_eq!(HttpMethod::parse("PUT"), Some(HttpMethod::Put));
        assert_eq!(HttpMethod::parse("DELETE"), Some(HttpMethod::Delete));
    }

    #[test]
    fn parse_rejects_other_spellings() {
        for method in ["get", "Post", "PATCH", "HEAD", "", " GET", "GET "] {
            assert_eq!(HttpMethod::parse(method), None, "{method:?}");
        }
    }

    #[test]
    fn display_round_trips_through_parse() {
        for method in [HttpMethod::Get, HttpMethod::Post, HttpMethod::Put, HttpMethod::Delete] {
            assert_eq!(HttpMethod::parse(&method.to_string()), Some(method));
        }
    }

    #[test]
    fn header_lookup_ignores_case() {
        let mut response = HttpResponse::new(200, "ok");
        response
            .headers
            .push(("Content-Type".to_string(), "text/html".to_string()));
        assert_eq!(response.header("content-type"), Some("text/html"));
        assert_eq!(response.header("x-missing"), None);
    }

    #[test]
    fn text_is_lossy_for_invalid_utf8() {
        let response = HttpResponse::new(200, vec![b'o', b'k', 0xff]);
        assert_eq!(response.text(), "ok\u{fffd}");
        assert_eq!(response.body_bytes(), &[b'o', b'k', 0xff]);
    }
}
