//! Blocking transport built on `ureq`.
//!
//! # Design
//! Every request gets its own agent, configured from the option bag (timeouts)
//! and from the construction-time TLS flag. Cookies are not delegated to
//! ureq; the `CookieJar` found under `cookies` renders the `Cookie` header and
//! ingests `Set-Cookie` responses so it can persist them to its file.
//!
//! Redirects are followed here rather than by ureq so that cookies set on an
//! intermediate hop (a login 302, say) reach the jar. 301/302/303 continue as
//! a bodiless GET; 307/308 repeat the method and body.
//!
//! Request body precedence when several groups are present: `json`, then
//! `form-fields`, then `body`.

use serde_json::Value;
use ureq::http::header::{CONTENT_TYPE, COOKIE, LOCATION, SET_COOKIE};
use ureq::tls::TlsConfig;
use ureq::typestate::WithBody;
use ureq::{Agent, Body, RequestBuilder};
use url::Url;

use crate::cookies::CookieJar;
use crate::error::TransportError;
use crate::http::{HttpMethod, HttpResponse, Transport};
use crate::options::{HeaderState, OptionSet, OptionValue, BODY, FORM_FIELDS, JSON, QUERY};

/// Default `Transport` performing real HTTP(S) exchanges.
#[derive(Debug, Clone)]
pub struct UreqTransport {
    verify_tls: bool,
}

impl Default for UreqTransport {
    fn default() -> Self {
        Self { verify_tls: true }
    }
}

impl UreqTransport {
    pub fn new(verify_tls: bool) -> Self {
        Self { verify_tls }
    }

    pub fn verifies_tls(&self) -> bool {
        self.verify_tls
    }

    fn agent(&self, options: &OptionSet) -> Agent {
        let tls = TlsConfig::builder()
            .disable_verification(!self.verify_tls)
            .build();
        Agent::config_builder()
            .http_status_as_error(false)
            .max_redirects(0)
            .timeout_connect(options.connect_timeout())
            .timeout_global(options.timeout())
            .tls_config(tls)
            .build()
            .new_agent()
    }
}

impl Transport for UreqTransport {
    fn set_verification(&mut self, verify: bool) {
        self.verify_tls = verify;
    }

    fn request(
        &self,
        method: HttpMethod,
        target: &str,
        options: &OptionSet,
    ) -> Result<HttpResponse, TransportError> {
        let mut url = Url::parse(target).map_err(|e| TransportError::InvalidUrl {
            url: target.to_string(),
            reason: e.to_string(),
        })?;
        apply_query(&mut url, options)?;

        let headers = caller_headers(options);
        let has_content_type = headers
            .iter()
            .any(|(name, _)| name.eq_ignore_ascii_case(CONTENT_TYPE.as_str()));
        let mut payload = payload(options, has_content_type)?;
        let jar = options.cookies();
        let agent = self.agent(options);

        let mut method = method;
        let mut redirects = 0;
        let response = loop {
            let response = exchange(&agent, method, &url, &headers, jar, &payload)?;
            let Some(next) = redirect_target(&response, &url) else {
                break response;
            };
            if redirects == MAX_REDIRECTS {
                return Err(TransportError::Request(format!(
                    "will not follow more than {MAX_REDIRECTS} redirects"
                )));
            }
            redirects += 1;
            if !matches!(response.status, 307 | 308) {
                method = HttpMethod::Get;
                payload = Payload::Empty;
            }
            tracing::debug!(status = response.status, from = %url, to = %next, "following redirect");
            url = next;
        };

        if options.http_errors() && response.status >= 400 {
            return Err(TransportError::Status {
                status: response.status,
                body: response.text().into_owned(),
            });
        }
        Ok(response)
    }
}

/// Redirect hops followed before giving up.
const MAX_REDIRECTS: usize = 5;

/// One request/response hop. The jar sees the `Set-Cookie` headers of every
/// hop, redirects included.
fn exchange(
    agent: &Agent,
    method: HttpMethod,
    url: &Url,
    caller: &[(String, String)],
    jar: Option<&CookieJar>,
    payload: &Payload,
) -> Result<HttpResponse, TransportError> {
    let mut headers = caller.to_vec();
    if let Some(cookie) = jar.and_then(|jar| jar.request_header(url)) {
        headers.push((COOKIE.as_str().to_string(), cookie));
    }

    tracing::trace!(%method, url = %url, headers = headers.len(), "sending request");
    let uri = url.as_str();
    let response = match method {
        HttpMethod::Get | HttpMethod::Delete => {
            let builder = if method == HttpMethod::Get {
                agent.get(uri)
            } else {
                agent.delete(uri)
            };
            let builder = with_headers(builder, &headers);
            match payload {
                Payload::Empty => builder.call(),
                payload => send(builder.force_send_body(), payload),
            }
        }
        HttpMethod::Post => send(with_headers(agent.post(uri), &headers), payload),
        HttpMethod::Put => send(with_headers(agent.put(uri), &headers), payload),
    }?;

    let response = read_response(response)?;
    if let Some(jar) = jar {
        let set_cookies = response
            .headers
            .iter()
            .filter(|(name, _)| name.eq_ignore_ascii_case(SET_COOKIE.as_str()))
            .map(|(_, value)| value.as_str());
        if let Err(err) = jar.store_response(set_cookies, url) {
            tracing::warn!(path = %jar.path().display(), error = %err, "failed to persist cookies");
        }
    }
    Ok(response)
}

/// Where a 3xx response points, resolved against the URL that produced it.
/// Only http(s) targets are followed.
fn redirect_target(response: &HttpResponse, current: &Url) -> Option<Url> {
    if !matches!(response.status, 301 | 302 | 303 | 307 | 308) {
        return None;
    }
    let location = response.header(LOCATION.as_str())?;
    let next = current.join(location).ok()?;
    matches!(next.scheme(), "http" | "https").then_some(next)
}

#[derive(Debug)]
enum Payload {
    Empty,
    Bytes {
        data: Vec<u8>,
        content_type: Option<&'static str>,
    },
    Form(Vec<(String, String)>),
}

fn payload(options: &OptionSet, has_content_type: bool) -> Result<Payload, TransportError> {
    if let Some(value) = options.get(JSON) {
        let data = match value {
            OptionValue::String(text) => text.clone().into_bytes(),
            other => match other.to_value() {
                Some(value) => serde_json::to_vec(&value).map_err(|e| invalid(JSON, e))?,
                None => return Err(invalid(JSON, "a cookie jar is not a JSON document")),
            },
        };
        let content_type = (!has_content_type).then_some("application/json");
        return Ok(Payload::Bytes { data, content_type });
    }
    if let Some(value) = options.get(FORM_FIELDS) {
        return match value.to_value() {
            Some(Value::Object(map)) => {
                let mut pairs = Vec::new();
                for (key, field) in &map {
                    flatten(key.clone(), field, &mut pairs);
                }
                Ok(Payload::Form(pairs))
            }
            _ => Err(invalid(FORM_FIELDS, "expected a map of fields")),
        };
    }
    match options.get(BODY) {
        None | Some(OptionValue::Null) => Ok(Payload::Empty),
        Some(OptionValue::String(text)) => Ok(Payload::Bytes {
            data: text.clone().into_bytes(),
            content_type: None,
        }),
        Some(OptionValue::Number(number)) => Ok(Payload::Bytes {
            data: number.to_string().into_bytes(),
            content_type: None,
        }),
        Some(OptionValue::Bool(flag)) => Ok(Payload::Bytes {
            data: scalar(&Value::Bool(*flag)).into_bytes(),
            content_type: None,
        }),
        Some(_) => Err(invalid(BODY, "expected text, encode structured bodies first")),
    }
}

fn apply_query(url: &mut Url, options: &OptionSet) -> Result<(), TransportError> {
    match options.get(QUERY) {
        None | Some(OptionValue::Null) => Ok(()),
        Some(OptionValue::String(query)) => {
            url.set_query(Some(query.trim_start_matches('?')));
            Ok(())
        }
        Some(value) => {
            let map = value
                .as_map()
                .ok_or_else(|| invalid(QUERY, "expected a map or a query string"))?;
            let mut pairs = Vec::new();
            for (key, value) in map {
                flatten(key.clone(), value, &mut pairs);
            }
            url.set_query(None);
            if !pairs.is_empty() {
                url.query_pairs_mut().extend_pairs(pairs);
            }
            Ok(())
        }
    }
}

fn caller_headers(options: &OptionSet) -> Vec<(String, String)> {
    match options.headers() {
        HeaderState::Map(map) => map
            .iter()
            .filter_map(|(name, value)| match value {
                Value::Null => None,
                Value::Array(items) => Some((
                    name.clone(),
                    items.iter().map(scalar).collect::<Vec<_>>().join(", "),
                )),
                other => Some((name.clone(), scalar(other))),
            })
            .collect(),
        HeaderState::Disabled | HeaderState::Unset => Vec::new(),
    }
}

/// Flatten nested maps and lists into `key[sub]` pairs. Nulls are dropped.
fn flatten(key: String, value: &Value, out: &mut Vec<(String, String)>) {
    match value {
        Value::Null => {}
        Value::Object(map) => {
            for (sub, nested) in map {
                flatten(format!("{key}[{sub}]"), nested, out);
            }
        }
        Value::Array(items) => {
            for (index, nested) in items.iter().enumerate() {
                flatten(format!("{key}[{index}]"), nested, out);
            }
        }
        other => out.push((key, scalar(other))),
    }
}

fn scalar(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        Value::Bool(true) => "1".to_string(),
        Value::Bool(false) => "0".to_string(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

fn invalid(key: &str, reason: impl ToString) -> TransportError {
    TransportError::InvalidOption {
        key: key.to_string(),
        reason: reason.to_string(),
    }
}

fn with_headers<B>(mut builder: RequestBuilder<B>, headers: &[(String, String)]) -> RequestBuilder<B> {
    for (name, value) in headers {
        builder = builder.header(name.as_str(), value.as_str());
    }
    builder
}

fn send(
    builder: RequestBuilder<WithBody>,
    payload: &Payload,
) -> Result<ureq::http::Response<Body>, ureq::Error> {
    match payload {
        Payload::Empty => builder.send_empty(),
        Payload::Bytes {
            data,
            content_type: Some(content_type),
        } => builder.content_type(*content_type).send(&data[..]),
        Payload::Bytes {
            data,
            content_type: None,
        } => builder.send(&data[..]),
        Payload::Form(pairs) => {
            builder.send_form(pairs.iter().map(|(key, value)| (key.as_str(), value.as_str())))
        }
    }
}

fn read_response(mut response: ureq::http::Response<Body>) -> Result<HttpResponse, TransportError> {
    let status = response.status().as_u16();
    let headers = response
        .headers()
        .iter()
        .filter_map(|(name, value)| {
            value
                .to_str()
                .ok()
                .map(|value| (name.as_str().to_string(), value.to_string()))
        })
        .collect();
    let body = response.body_mut().read_to_vec()?;
    Ok(HttpResponse {
        status,
        headers,
        body,
    })
}
