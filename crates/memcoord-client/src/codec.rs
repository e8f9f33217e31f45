//! Value encoding for cache payloads
//!
//! Encoding is type-aware, first match wins:
//! 1. null and strings are written as literal text (`"null"` for null)
//! 2. date/times are normalized to UTC and written as RFC 3339 with a `Z` offset
//! 3. everything else is written as a JSON document
//!
//! Decoding is type-oblivious: a retrieved payload is returned as the text the
//! store holds. Callers that stored JSON decode it themselves, e.g. with
//! [`decode_json`].

use std::borrow::Cow;

use bytes::Bytes;
use chrono::{DateTime, SecondsFormat, TimeZone, Utc};
use memcoord_common::CodecError;
use serde::Serialize;
use serde::de::DeserializeOwned;

/// Text written for a null value
pub const NULL_TEXT: &str = "null";

/// A value that can be written to the cache
pub trait CacheEncode {
    fn encode(&self) -> Result<String, CodecError>;
}

/// Wrapper that stores any serializable value as a JSON document
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Json<T>(pub T);

impl<T: Serialize> CacheEncode for Json<T> {
    fn encode(&self) -> Result<String, CodecError> {
        Ok(serde_json::to_string(&self.0)?)
    }
}

impl CacheEncode for str {
    fn encode(&self) -> Result<String, CodecError> {
        Ok(self.to_string())
    }
}

impl CacheEncode for String {
    fn encode(&self) -> Result<String, CodecError> {
        Ok(self.clone())
    }
}

impl CacheEncode for Cow<'_, str> {
    fn encode(&self) -> Result<String, CodecError> {
        Ok(self.to_string())
    }
}

impl<T: CacheEncode + ?Sized> CacheEncode for &T {
    fn encode(&self) -> Result<String, CodecError> {
        (**self).encode()
    }
}

impl<T: CacheEncode> CacheEncode for Option<T> {
    fn encode(&self) -> Result<String, CodecError> {
        match self {
            Some(value) => value.encode(),
            None => Ok(NULL_TEXT.to_string()),
        }
    }
}

impl<Tz: TimeZone> CacheEncode for DateTime<Tz> {
    fn encode(&self) -> Result<String, CodecError> {
        Ok(format_timestamp(self))
    }
}

/// JSON strings and null follow the literal rule; other JSON values are
/// written as documents. Wrap in [`Json`] to force a quoted JSON string.
impl CacheEncode for serde_json::Value {
    fn encode(&self) -> Result<String, CodecError> {
        match self {
            serde_json::Value::Null => Ok(NULL_TEXT.to_string()),
            serde_json::Value::String(s) => Ok(s.clone()),
            other => Ok(serde_json::to_string(other)?),
        }
    }
}

macro_rules! impl_json_scalar {
    ($($t:ty),* $(,)?) => {
        $(
            impl CacheEncode for $t {
                fn encode(&self) -> Result<String, CodecError> {
                    Ok(serde_json::to_string(self)?)
                }
            }
        )*
    };
}

impl_json_scalar!(
    bool, i8, i16, i32, i64, i128, isize, u8, u16, u32, u64, u128, usize, f32, f64
);

/// Encode a value into the text written to the store
pub fn encode_value<V: CacheEncode + ?Sized>(value: &V) -> Result<String, CodecError> {
    value.encode()
}

/// Format an instant as UTC RFC 3339, e.g. `2024-01-02T03:04:05Z`.
///
/// Fractional seconds appear only when non-zero, so the text parses back to
/// the same instant.
pub fn format_timestamp<Tz: TimeZone>(value: &DateTime<Tz>) -> String {
    value
        .with_timezone(&Utc)
        .to_rfc3339_opts(SecondsFormat::AutoSi, true)
}

/// Turn a stored payload back into text
pub fn decode_payload(payload: Bytes) -> Result<String, CodecError> {
    Ok(String::from_utf8(payload.to_vec())?)
}

/// Decode text that was stored as a JSON document
pub fn decode_json<T: DeserializeOwned>(text: &str) -> Result<T, CodecError> {
    Ok(serde_json::from_str(text)?)
}
