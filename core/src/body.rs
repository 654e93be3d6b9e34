//! Merges per-request parameter groups into the option bag.
//!
//! Query and form groups are left as native maps because the transport
//! URL-encodes them itself. Any other structured group is serialized once by
//! the codec so the transport can send it as-is.

use serde_json::{Map, Value};

use crate::codec::Codec;
use crate::options::{OptionSet, OptionValue, FORM_FIELDS, QUERY};

/// Parameter groups for one request, keyed by option name.
pub type RequestParams = Map<String, Value>;

/// Groups that are never serialized.
pub const PASS_THROUGH_GROUPS: [&str; 2] = [QUERY, FORM_FIELDS];

#[derive(Debug, Clone, Copy)]
pub struct BodyEncoder<'c, C> {
    codec: &'c C,
}

impl<'c, C: Codec> BodyEncoder<'c, C> {
    pub fn new(codec: &'c C) -> Self {
        Self { codec }
    }

    /// Store every group of `params` in `options`, serializing structured
    /// body groups when `needs_encoding` is set.
    pub fn apply(&self, options: &mut OptionSet, params: &RequestParams, needs_encoding: bool) {
        for (group, value) in params {
            options.set(group.as_str(), self.encode_group(group, value, needs_encoding));
        }
    }

    fn encode_group(&self, group: &str, value: &Value, needs_encoding: bool) -> OptionValue {
        let native = OptionValue::from(value.clone());
        if !needs_encoding || PASS_THROUGH_GROUPS.contains(&group) || !native.is_structured() {
            return native;
        }
        match self.codec.encode(value) {
            Ok(text) => OptionValue::String(text.trim().to_string()),
            Err(err) => {
                tracing::debug!(group, error = %err, "body group left unencoded");
                native
            }
        }
    }
}
