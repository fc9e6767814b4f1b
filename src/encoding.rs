//! Value encoding
//!
//! Turns typed keys and values into the opaque byte strings stored in
//! records, and back. Keys are indexed by their encoded bytes, so two keys
//! are the same key exactly when their encodings are equal.

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::Result;

/// Encode a value with bincode
pub fn encode<T>(value: &T) -> Result<Vec<u8>>
where
    T: Serialize + ?Sized,
{
    Ok(bincode::serialize(value)?)
}

/// Decode a value previously produced by [`encode`]
pub fn decode<T>(bytes: &[u8]) -> Result<T>
where
    T: DeserializeOwned,
{
    Ok(bincode::deserialize(bytes)?)
}
