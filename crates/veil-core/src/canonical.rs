//! Canonical encoding of recoverable field maps.
//!
//! The vault encrypts one payload per (principal, level). The payload is
//! the level's complete field map encoded as CBOR over a `BTreeMap`, so
//! key order is sorted and the bytes are deterministic for a given map.
//! Deterministic bytes plus a deterministic cipher make vault writes
//! idempotent for identical inputs.

use std::collections::BTreeMap;

use crate::error::{CoreError, Result};
use crate::value::FieldValue;

/// Encode a field map to canonical CBOR bytes.
pub fn encode_fields(fields: &BTreeMap<String, FieldValue>) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    ciborium::into_writer(fields, &mut buf)
        .map_err(|e| CoreError::EncodingError(e.to_string()))?;
    Ok(buf)
}

/// Decode canonical CBOR bytes back into a field map.
pub fn decode_fields(bytes: &[u8]) -> Result<BTreeMap<String, FieldValue>> {
    ciborium::from_reader(bytes).map_err(|e: ciborium::de::Error<std::io::Error>| {
        CoreError::DecodingError(e.to_string())
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> BTreeMap<String, FieldValue> {
        let mut fields = BTreeMap::new();
        fields.insert("firstname".to_string(), FieldValue::from("Alice"));
        fields.insert("age".to_string(), FieldValue::Num(30.0));
        fields.insert("active".to_string(), FieldValue::Bool(true));
        fields
    }

    #[test]
    fn test_round_trip() {
        let fields = sample();
        let bytes = encode_fields(&fields).unwrap();
        assert_eq!(decode_fields(&bytes).unwrap(), fields);
    }

    #[test]
    fn test_encoding_is_deterministic() {
        // Insertion order cannot leak into the bytes: BTreeMap sorts.
        let mut a = BTreeMap::new();
        a.insert("b".to_string(), FieldValue::from("2"));
        a.insert("a".to_string(), FieldValue::from("1"));

        let mut b = BTreeMap::new();
        b.insert("a".to_string(), FieldValue::from("1"));
        b.insert("b".to_string(), FieldValue::from("2"));

        assert_eq!(encode_fields(&a).unwrap(), encode_fields(&b).unwrap());
    }

    #[test]
    fn test_decode_garbage_fails() {
        assert!(decode_fields(&[0xff, 0x00, 0x13]).is_err());
    }
}
