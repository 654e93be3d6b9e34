//! Stateful request client with a composable option bag.
//!
//! # Design
//! `RequestClient` owns an `OptionSet` that every configuration call mutates
//! and every request reads. Settings are sticky: headers, timeouts, hidden
//! headers and merged body groups all apply to later requests until they are
//! overwritten or deleted.
//!
//! The two dispatch methods deliberately swallow different failures:
//!
//! | failure            | `make_request`        | `make_html_request` |
//! |--------------------|-----------------------|---------------------|
//! | unsupported method | `Ok(Outcome::Failed)` | `Outcome::Failed`   |
//! | transport error    | `Err(TransportError)` | `Outcome::Failed`   |
//! | undecodable body   | `Ok(Outcome::Failed)` | n/a                 |
//!
//! `Outcome::Failed` carries no cause. Callers that need to tell a rejected
//! method from a bad body must check those conditions themselves.

use std::path::Path;

use serde_json::{Map, Value};

use crate::body::{BodyEncoder, RequestParams};
use crate::codec::{Codec, JsonCodec};
use crate::config::ClientConfig;
use crate::cookies::{CookieFile, CookieJar};
use crate::error::{ClientError, TransportError};
use crate::http::{HttpMethod, HttpResponse, Transport};
use crate::options::{OptionSet, OptionValue, CONNECT_TIMEOUT, COOKIES, HEADERS, TIMEOUT};
use crate::transport::UreqTransport;

/// Connect and total timeout applied by `set_default_timeout`, in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 15;

/// Result of a request that may have failed without saying why.
#[must_use]
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome<T> {
    Value(T),
    Failed,
}

impl<T> Outcome<T> {
    pub fn is_failed(&self) -> bool {
        matches!(self, Outcome::Failed)
    }

    pub fn value(&self) -> Option<&T> {
        match self {
            Outcome::Value(value) => Some(value),
            Outcome::Failed => None,
        }
    }

    pub fn into_option(self) -> Option<T> {
        match self {
            Outcome::Value(value) => Some(value),
            Outcome::Failed => None,
        }
    }
}

/// Undecoded response returned by `make_html_request`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RawResult {
    /// Body only, when raw content was requested.
    Content(String),
    Page { code: u16, html: String },
}

impl RawResult {
    pub fn content(&self) -> &str {
        match self {
            RawResult::Content(content) => content,
            RawResult::Page { html, .. } => html,
        }
    }
}

/// HTTP client holding request options and an optional cookie jar file.
///
/// Dropping the client removes its jar file.
pub struct RequestClient<T = UreqTransport, C = JsonCodec> {
    transport: T,
    codec: C,
    options: OptionSet,
    cookie_file: Option<CookieFile>,
}

impl RequestClient {
    /// Build a client on the default ureq transport.
    pub fn new(enable_cookies: bool, verify_tls: bool) -> Result<Self, ClientError> {
        Self::with_config(ClientConfig::new(enable_cookies, verify_tls))
    }

    pub fn with_config(config: ClientConfig) -> Result<Self, ClientError> {
        let transport = UreqTransport::new(config.verify_tls);
        Self::with_transport(config, transport)
    }
}

impl<T: Transport> RequestClient<T> {
    pub fn with_transport(config: ClientConfig, transport: T) -> Result<Self, ClientError> {
        Self::with_parts(config, transport, JsonCodec)
    }
}

impl<T: Transport, C: Codec> RequestClient<T, C> {
    /// Assemble a client. When cookies are enabled this creates the jar file
    /// and installs a jar under `cookies`; nothing else touches the disk or
    /// the network.
    pub fn with_parts(config: ClientConfig, mut transport: T, codec: C) -> Result<Self, ClientError> {
        transport.set_verification(config.verify_tls);
        let cookie_file = if config.enable_cookies {
            Some(CookieFile::create(&config.resolved_cookie_dir())?)
        } else {
            None
        };
        let mut client = Self {
            transport,
            codec,
            options: OptionSet::new(),
            cookie_file,
        };
        client.set_cookies()?;
        Ok(client)
    }

    pub fn options(&self) -> &OptionSet {
        &self.options
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Backing file of the cookie jar, if cookies are enabled.
    pub fn cookie_path(&self) -> Option<&Path> {
        self.cookie_file.as_ref().map(CookieFile::path)
    }

    /// Replace the whole header set. An empty input leaves the current
    /// headers untouched.
    pub fn add_headers<I, K, V>(&mut self, headers: I)
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let headers: Map<String, Value> = headers
            .into_iter()
            .map(|(name, value)| (name.into(), Value::String(value.into())))
            .collect();
        if !headers.is_empty() {
            self.options.set(HEADERS, headers);
        }
    }

    /// Send no caller headers on subsequent requests, until `add_headers`
    /// or `set_option("headers", ..)` installs new ones.
    pub fn hide_headers(&mut self) {
        self.options.set(HEADERS, false);
    }

    pub fn set_timeout(&mut self, connect_secs: u64, total_secs: u64) {
        self.options.set(CONNECT_TIMEOUT, connect_secs);
        self.options.set(TIMEOUT, total_secs);
    }

    pub fn set_default_timeout(&mut self) {
        self.set_timeout(DEFAULT_TIMEOUT_SECS, DEFAULT_TIMEOUT_SECS);
    }

    pub fn set_option(&mut self, key: impl Into<String>, value: impl Into<OptionValue>) {
        self.options.set(key, value);
    }

    pub fn delete_option(&mut self, key: &str) {
        self.options.remove(key);
    }

    /// Install a fresh jar over the client's jar file. Session cookies held
    /// by the previous jar are dropped; persistent ones are reloaded from the
    /// file. Does nothing when cookies are disabled.
    pub fn set_cookies(&mut self) -> Result<(), ClientError> {
        let Some(file) = &self.cookie_file else {
            return Ok(());
        };
        let jar = CookieJar::open(file.path())?;
        self.options.set(COOKIES, jar);
        Ok(())
    }

    /// Merge parameter groups into the options. See `BodyEncoder`.
    pub fn set_body(&mut self, params: &RequestParams, needs_encoding: bool) {
        BodyEncoder::new(&self.codec).apply(&mut self.options, params, needs_encoding);
    }

    /// Send a request and decode the body with the codec.
    ///
    /// Unsupported methods and undecodable bodies both give
    /// `Ok(Outcome::Failed)`. Transport errors, including 4xx/5xx while
    /// `http-errors` is on, are returned as `Err`.
    pub fn make_request(
        &mut self,
        method: &str,
        target: &str,
        params: &RequestParams,
        encode_params: bool,
    ) -> Result<Outcome<Value>, TransportError> {
        let Some(method) = self.prepare(method, target, params, encode_params) else {
            return Ok(Outcome::Failed);
        };
        let response = self.transport.request(method, target, &self.options)?;
        match self.codec.decode(response.body_bytes()) {
            Ok(value) => Ok(Outcome::Value(value)),
            Err(err) => {
                tracing::debug!(%method, target, status = response.status, error = %err, "response body not decodable");
                Ok(Outcome::Failed)
            }
        }
    }

    /// Send a request and return the body undecoded, alone or with the
    /// status code. Every failure, transport errors included, gives
    /// `Outcome::Failed`.
    pub fn make_html_request(
        &mut self,
        method: &str,
        target: &str,
        params: &RequestParams,
        encode_params: bool,
        raw_content_only: bool,
    ) -> Outcome<RawResult> {
        let Some(method) = self.prepare(method, target, params, encode_params) else {
            return Outcome::Failed;
        };
        match self.transport.request(method, target, &self.options) {
            Ok(response) => Outcome::Value(raw_result(&response, raw_content_only)),
            Err(err) => {
                tracing::debug!(%method, target, error = %err, "transport failure swallowed");
                Outcome::Failed
            }
        }
    }

    /// Validate the method and merge `params`. `None` means the request must
    /// not be sent.
    fn prepare(
        &mut self,
        method: &str,
        target: &str,
        params: &RequestParams,
        encode_params: bool,
    ) -> Option<HttpMethod> {
        let Some(parsed) = HttpMethod::parse(method) else {
            tracing::debug!(method, target, "unsupported HTTP method");
            return None;
        };
        if !params.is_empty() {
            self.set_body(params, encode_params);
        }
        tracing::debug!(method = %parsed, target, "dispatching request");
        Some(parsed)
    }
}

fn raw_result(response: &HttpResponse, raw_content_only: bool) -> RawResult {
    let content = response.text().into_owned();
    if raw_content_only {
        RawResult::Content(content)
    } else {
        RawResult::Page {
            code: response.status_code(),
            html: content,
        }
    }
}
