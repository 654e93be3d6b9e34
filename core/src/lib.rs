//! Configurable blocking HTTP request client.
//!
//! # Overview
//! A `RequestClient` keeps an ordered option bag (headers, timeouts, cookie
//! jar, body groups, arbitrary transport keys) and applies it to every
//! request it sends through a `Transport`. Responses come back either decoded
//! by a `Codec` (`make_request`) or raw with their status code
//! (`make_html_request`).
//!
//! # Design
//! - Options are sticky client state, not per-call arguments.
//! - The transport and codec are traits; `UreqTransport` and `JsonCodec` are
//!   the defaults, and tests plug in stubs.
//! - Cookie persistence is a temp file owned by the client and removed when
//!   the client is dropped.
//! - The two dispatch methods swallow different failures on purpose; see
//!   `client` for the table.

pub mod body;
pub mod client;
pub mod codec;
pub mod config;
pub mod cookies;
pub mod error;
pub mod http;
pub mod options;
pub mod transport;

pub use body::{BodyEncoder, RequestParams};
pub use client::{Outcome, RawResult, RequestClient, DEFAULT_TIMEOUT_SECS};
pub use codec::{Codec, JsonCodec};
pub use config::ClientConfig;
pub use cookies::{CookieFile, CookieJar};
pub use error::{ClientError, CodecError, TransportError};
pub use http::{HttpMethod, HttpResponse, Transport};
pub use options::{HeaderState, OptionSet, OptionValue};
pub use transport::UreqTransport;
