//! The option bag applied to every outgoing request.
//!
//! # Design
//! Transports understand a loose set of keys, most of them optional, so the
//! bag stays a string-keyed map. Values are a closed `OptionValue` enum rather
//! than raw JSON so the cookie jar handle can live next to plain data, and the
//! well-known keys get typed accessors.
//!
//! Keys keep their first insertion position; overwriting a key updates it in
//! place.

use std::time::Duration;

use indexmap::IndexMap;
use serde_json::{Map, Number, Value};

use crate::cookies::CookieJar;

pub const HEADERS: &str = "headers";
pub const COOKIES: &str = "cookies";
pub const CONNECT_TIMEOUT: &str = "connect-timeout";
pub const TIMEOUT: &str = "timeout";
pub const QUERY: &str = "query";
pub const FORM_FIELDS: &str = "form-fields";
pub const BODY: &str = "body";
pub const JSON: &str = "json";
pub const HTTP_ERRORS: &str = "http-errors";

/// A single option value.
#[derive(Debug, Clone, PartialEq)]
pub enum OptionValue {
    Null,
    Bool(bool),
    Number(Number),
    String(String),
    List(Vec<Value>),
    Map(Map<String, Value>),
    /// Opaque cookie jar handle, only meaningful under the `cookies` key.
    Cookies(CookieJar),
}

impl OptionValue {
    /// Lists and maps are structured; everything else is a scalar.
    pub fn is_structured(&self) -> bool {
        matches!(self, OptionValue::List(_) | OptionValue::Map(_))
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            OptionValue::Bool(flag) => Some(*flag),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            OptionValue::String(text) => Some(text),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            OptionValue::Number(number) => number.as_f64(),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&Map<String, Value>> {
        match self {
            OptionValue::Map(map) => Some(map),
            _ => None,
        }
    }

    pub fn as_cookies(&self) -> Option<&CookieJar> {
        match self {
            OptionValue::Cookies(jar) => Some(jar),
            _ => None,
        }
    }

    /// The plain-data form of this value. `None` for a cookie jar handle.
    pub fn to_value(&self) -> Option<Value> {
        Some(match self {
            OptionValue::Null => Value::Null,
            OptionValue::Bool(flag) => Value::Bool(*flag),
            OptionValue::Number(number) => Value::Number(number.clone()),
            OptionValue::String(text) => Value::String(text.clone()),
            OptionValue::List(items) => Value::Array(items.clone()),
            OptionValue::Map(map) => Value::Object(map.clone()),
            OptionValue::Cookies(_) => return None,
        })
    }
}

impl From<Value> for OptionValue {
    fn from(value: Value) -> Self {
        match value {
            Value::Null => OptionValue::Null,
            Value::Bool(flag) => OptionValue::Bool(flag),
            Value::Number(number) => OptionValue::Number(number),
            Value::String(text) => OptionValue::String(text),
            Value::Array(items) => OptionValue::List(items),
            Value::Object(map) => OptionValue::Map(map),
        }
    }
}

impl From<bool> for OptionValue {
    fn from(flag: bool) -> Self {
        OptionValue::Bool(flag)
    }
}

impl From<u64> for OptionValue {
    fn from(number: u64) -> Self {
        OptionValue::Number(number.into())
    }
}

impl From<i64> for OptionValue {
    fn from(number: i64) -> Self {
        OptionValue::Number(number.into())
    }
}

impl From<&str> for OptionValue {
    fn from(text: &str) -> Self {
        OptionValue::String(text.to_string())
    }
}

impl From<String> for OptionValue {
    fn from(text: String) -> Self {
        OptionValue::String(text)
    }
}

impl From<Map<String, Value>> for OptionValue {
    fn from(map: Map<String, Value>) -> Self {
        OptionValue::Map(map)
    }
}

impl From<CookieJar> for OptionValue {
    fn from(jar: CookieJar) -> Self {
        OptionValue::Cookies(jar)
    }
}

/// What the `headers` entry asks the transport to do.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum HeaderState<'a> {
    /// No `headers` entry, or one the transport should not interpret.
    Unset,
    /// `headers` is `false`: send no caller headers at all.
    Disabled,
    Map(&'a Map<String, Value>),
}

/// Ordered option-name to value mapping.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OptionSet {
    entries: IndexMap<String, OptionValue>,
}

impl OptionSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&OptionValue> {
        self.entries.get(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// Insert or overwrite `key`. Returns the previous value, if any.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<OptionValue>) -> Option<OptionValue> {
        self.entries.insert(key.into(), value.into())
    }

    /// Remove `key` if present, keeping the order of the remaining keys.
    pub fn remove(&mut self, key: &str) -> Option<OptionValue> {
        self.entries.shift_remove(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &OptionValue)> {
        self.entries.iter().map(|(key, value)| (key.as_str(), value))
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn headers(&self) -> HeaderState<'_> {
        match self.get(HEADERS) {
            Some(OptionValue::Bool(false)) => HeaderState::Disabled,
            Some(OptionValue::Map(map)) => HeaderState::Map(map),
            _ => HeaderState::Unset,
        }
    }

    pub fn cookies(&self) -> Option<&CookieJar> {
        self.get(COOKIES).and_then(OptionValue::as_cookies)
    }

    pub fn connect_timeout(&self) -> Option<Duration> {
        self.get(CONNECT_TIMEOUT).and_then(seconds)
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.get(TIMEOUT).and_then(seconds)
    }

    /// `http-errors` flag; on unless explicitly set to `false`.
    pub fn http_errors(&self) -> bool {
        self.get(HTTP_ERRORS)
            .and_then(OptionValue::as_bool)
            .unwrap_or(true)
    }
}

/// Positive second counts become durations; zero means "no limit".
fn seconds(value: &OptionValue) -> Option<Duration> {
    let secs = value.as_f64()?;
    if secs.is_finite() && secs > 0.0 {
        Some(Duration::from_secs_f64(secs))
    } else {
        None
    }
}
