//! Structured-value serialization used for request bodies and responses.

use serde_json::Value;

use crate::error::CodecError;

/// Encodes structured values to text and decodes response bytes back.
pub trait Codec {
    fn decode(&self, bytes: &[u8]) -> Result<Value, CodecError>;

    fn encode(&self, value: &Value) -> Result<String, CodecError>;
}

/// JSON codec backed by `serde_json`.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

impl Codec for JsonCodec {
    fn decode(&self, bytes: &[u8]) -> Result<Value, CodecError> {
        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Err(CodecError::Empty);
        }
        serde_json::from_slice(bytes).map_err(CodecError::Malformed)
    }

    fn encode(&self, value: &Value) -> Result<String, CodecError> {
        serde_json::to_string(value).map_err(CodecError::Encode)
    }
}
