//! Deterministic structural hashing of [`Value`]s.
//!
//! The hash is the change-detection primitive for the whole engine: emits
//! short-circuit on it, reconnect `current` checks compare it, and the
//! field-hash cache stores it. Two structurally equal values always hash
//! equal; object field order does not matter.

use serde_json::Value;
use xxhash_rust::xxh3::xxh3_64;

// Domain separation tags so e.g. the string "1" and the number 1 cannot
// collide through identical byte encodings.
const TAG_NULL: u8 = 0;
const TAG_BOOL: u8 = 1;
const TAG_INT: u8 = 2;
const TAG_UINT: u8 = 3;
const TAG_FLOAT: u8 = 4;
const TAG_STRING: u8 = 5;
const TAG_ARRAY: u8 = 6;
const TAG_OBJECT: u8 = 7;

/// Computes a deterministic 64-bit content hash of `value`.
///
/// Arrays hash order-dependently; objects hash order-independently (each
/// field contributes `xxh3(name || value-hash)` folded with XOR), so two
/// objects with the same fields in different insertion order hash equal.
pub fn content_hash(value: &Value) -> u64 {
    match value {
        Value::Array(items) => slice_hash(items),
        Value::Object(map) => map_hash(map),
        other => scalar_hash(other),
    }
}

/// Hashes a field map exactly as [`content_hash`] hashes
/// `Value::Object(map)`, without requiring ownership of a `Value`.
pub fn map_hash(map: &serde_json::Map<String, Value>) -> u64 {
    // XOR fold makes the result independent of field order.
    let mut acc: u64 = 0;
    for (name, field) in map {
        let mut buf = Vec::with_capacity(name.len() + 8);
        buf.extend_from_slice(name.as_bytes());
        buf.push(0);
        buf.extend_from_slice(&content_hash(field).to_le_bytes());
        acc ^= xxh3_64(&buf);
    }
    let mut buf = [0u8; 9];
    buf[0] = TAG_OBJECT;
    buf[1..].copy_from_slice(&acc.to_le_bytes());
    xxh3_64(&buf)
}

/// Hashes a slice of values exactly as [`content_hash`] hashes
/// `Value::Array(items)`.
pub fn slice_hash(items: &[Value]) -> u64 {
    let mut buf = Vec::with_capacity(1 + items.len() * 8);
    buf.push(TAG_ARRAY);
    for item in items {
        buf.extend_from_slice(&content_hash(item).to_le_bytes());
    }
    xxh3_64(&buf)
}

fn scalar_hash(value: &Value) -> u64 {
    match value {
        Value::Null => xxh3_64(&[TAG_NULL]),
        Value::Bool(b) => xxh3_64(&[TAG_BOOL, *b as u8]),
        Value::Number(n) => {
            let mut buf = [0u8; 9];
            if let Some(i) = n.as_i64() {
                buf[0] = TAG_INT;
                buf[1..].copy_from_slice(&i.to_le_bytes());
            } else if let Some(u) = n.as_u64() {
                buf[0] = TAG_UINT;
                buf[1..].copy_from_slice(&u.to_le_bytes());
            } else {
                buf[0] = TAG_FLOAT;
                buf[1..].copy_from_slice(&n.as_f64().unwrap_or(f64::NAN).to_bits().to_le_bytes());
            }
            xxh3_64(&buf)
        }
        Value::String(s) => {
            let mut buf = Vec::with_capacity(1 + s.len());
            buf.push(TAG_STRING);
            buf.extend_from_slice(s.as_bytes());
            xxh3_64(&buf)
        }
        Value::Array(items) => slice_hash(items),
        Value::Object(map) => map_hash(map),
    }
}

/// Renders a content hash as the fixed-width hex string used on the wire
/// (`dataHash` in reconnect subscriptions).
pub fn hash_hex(hash: u64) -> String {
    format!("{hash:016x}")
}
