//! Error types for the request client.
//!
//! # Design
//! Only two things can fail loudly: building a client (the cookie jar file
//! must be created) and the transport round-trip. Decode failures are
//! reported as `CodecError` by the codec but the client folds them into
//! `Outcome::Failed` instead of returning them.

use thiserror::Error;

/// Errors raised while constructing or reconfiguring a `RequestClient`.
#[derive(Debug, Error)]
pub enum ClientError {
    /// The cookie jar file could not be created or read.
    #[error("cookie jar I/O failed: {0}")]
    Io(#[from] std::io::Error),

    /// The cookie jar file exists but its contents could not be loaded.
    #[error("cookie jar is unreadable: {0}")]
    Cookies(String),
}

/// Network or transport-level failure reported by a `Transport`.
#[derive(Debug, Clone, Error)]
pub enum TransportError {
    /// The request could not be sent or the response could not be read.
    #[error("HTTP request error: {0}")]
    Request(String),

    /// The connect or total timeout elapsed.
    #[error("request timed out: {0}")]
    Timeout(String),

    /// Socket-level I/O failure.
    #[error("I/O error: {0}")]
    Io(String),

    /// The target is not an absolute http(s) URL.
    #[error("invalid URL {url}: {reason}")]
    InvalidUrl { url: String, reason: String },

    /// An option value has a shape the transport cannot send.
    #[error("option {key:?} cannot be sent: {reason}")]
    InvalidOption { key: String, reason: String },

    /// The server answered with a 4xx/5xx status while `http-errors` was on.
    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },
}

impl From<ureq::Error> for TransportError {
    fn from(err: ureq::Error) -> Self {
        match err {
            err @ ureq::Error::Timeout(_) => Self::Timeout(err.to_string()),
            ureq::Error::Io(io) => Self::Io(io.to_string()),
            other => Self::Request(other.to_string()),
        }
    }
}

/// The codec could not turn bytes into a structured value, or back.
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("body is empty")]
    Empty,

    #[error("malformed body: {0}")]
    Malformed(#[source] serde_json::Error),

    #[error("value cannot be encoded: {0}")]
    Encode(#[source] serde_json::Error),
}
