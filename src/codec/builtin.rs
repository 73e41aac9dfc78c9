//! Built-in codecs.
//!
//! The backend gateway encodes every `bytes` field as standard base64.
//! Clients of the standardized API see selected fields as `0x`-prefixed hex.

use base64::engine::general_purpose::{STANDARD, URL_SAFE};
use base64::Engine;

use crate::codec::CodecError;

/// Marker name selecting the hex codec.
pub const HEX_MARKER: &str = "hex";

/// Name of the default codec for unmarked byte fields.
pub const BASE64_MARKER: &str = "base64";

/// Decode base64, accepting both the standard and the URL-safe alphabet.
pub fn decode_base64(value: &str) -> Result<Vec<u8>, CodecError> {
    STANDARD
        .decode(value)
        .or_else(|_| URL_SAFE.decode(value))
        .map_err(|e| CodecError::InvalidBase64(e.to_string()))
}

/// Decode hex with an optional `0x` prefix.
pub fn decode_hex(value: &str) -> Result<Vec<u8>, CodecError> {
    let digits = value
        .strip_prefix("0x")
        .or_else(|| value.strip_prefix("0X"))
        .unwrap_or(value);
    hex::decode(digits).map_err(|e| CodecError::InvalidHex(e.to_string()))
}

/// Re-encode base64 in canonical (standard, padded) form.
pub fn base64_canonical(value: &str) -> Result<String, CodecError> {
    decode_base64(value).map(|bytes| STANDARD.encode(bytes))
}

/// Client hex → backend base64.
pub fn hex_to_base64(value: &str) -> Result<String, CodecError> {
    decode_hex(value).map(|bytes| STANDARD.encode(bytes))
}

/// Backend base64 → client `0x` hex.
pub fn base64_to_hex(value: &str) -> Result<String, CodecError> {
    decode_base64(value).map(|bytes| format!("0x{}", hex::encode(bytes)))
}
