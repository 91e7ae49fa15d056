//! Value encoding for stored records.
//!
//! Entity records are JSON objects. Tag values are empty. Watch counters
//! are decimal ASCII.

use serde::{de::DeserializeOwned, Serialize};

use crate::error::CoreError;

/// Encode a record for storage.
pub fn marshal<T: Serialize>(record: &T) -> Result<Vec<u8>, CoreError> {
    serde_json::to_vec(record).map_err(|e| CoreError::Codec(e.to_string()))
}

/// Decode a record read from `key`.
pub fn unmarshal<T: DeserializeOwned>(key: &str, bytes: &[u8]) -> Result<T, CoreError> {
    serde_json::from_slice(bytes).map_err(|e| CoreError::Codec(format!("{key}: {e}")))
}

/// Encode a watch counter.
pub fn encode_seq(seq: u64) -> Vec<u8> {
    seq.to_string().into_bytes()
}

/// Decode a watch counter, if the bytes hold one.
pub fn decode_seq(bytes: &[u8]) -> Option<u64> {
    std::str::from_utf8(bytes).ok()?.parse().ok()
}
