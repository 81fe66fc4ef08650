use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::errors::{ErrorInfo, TrackError};

/// Serialises `value` to JSON with object keys in sorted order.
///
/// Going through [`serde_json::Value`] sorts every map, so two structurally
/// equal payloads always produce identical bytes.
pub fn to_canonical_json_bytes<T: Serialize>(value: &T) -> Result<Vec<u8>, TrackError> {
    let value = serde_json::to_value(value)
        .map_err(|err| TrackError::Serde(ErrorInfo::new("serde.canonical", err.to_string())))?;
    serde_json::to_vec(&value)
        .map_err(|err| TrackError::Serde(ErrorInfo::new("serde.canonical", err.to_string())))
}

/// Canonical JSON as a `String`.
pub fn to_canonical_json_string<T: Serialize>(value: &T) -> Result<String, TrackError> {
    let bytes = to_canonical_json_bytes(value)?;
    String::from_utf8(bytes)
        .map_err(|err| TrackError::Serde(ErrorInfo::new("serde.canonical_utf8", err.to_string())))
}

pub fn from_json_slice<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, TrackError> {
    serde_json::from_slice(bytes)
        .map_err(|err| TrackError::Serde(ErrorInfo::new("serde.decode", err.to_string())))
}

pub fn from_json_str<T: DeserializeOwned>(text: &str) -> Result<T, TrackError> {
    from_json_slice(text.as_bytes())
}
