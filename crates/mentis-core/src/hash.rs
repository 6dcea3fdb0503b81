//! Content and input hashing.
//!
//! Two pure functions drive all deduplication in Mentis: `content_hash` for
//! artifact bytes and `input_hash` for workflow step inputs. Input hashing
//! serializes the value to canonical JSON first so that structurally equal
//! inputs always hash identically, independent of object key order and of
//! the process that produced them. The exact-match dedup invariant on
//! workflow steps depends on this stability.

use serde_json::Value;
use sha2::{Digest, Sha256};

/// Lowercase hex SHA-256 of the given bytes (64 characters).
pub fn content_hash(content: &[u8]) -> String {
    let digest = Sha256::digest(content);
    format!("{digest:x}")
}

/// Hash of the canonical JSON serialization of a step input.
///
/// Canonical form: object keys sorted lexicographically by UTF-8 code units,
/// arrays in order, numbers in serde_json's shortest round-trip form, no
/// insignificant whitespace. The writer is total over `serde_json::Value`,
/// so identical inputs always yield identical hashes.
pub fn input_hash(input: &Value) -> String {
    let mut out = String::new();
    write_canonical(input, &mut out);
    content_hash(out.as_bytes())
}

/// Emit a canonical JSON rendering of `value` into `out`.
///
/// Object keys are emitted in sorted order regardless of the map's internal
/// ordering, so the result does not depend on serde_json feature flags.
fn write_canonical(value: &Value, out: &mut String) {
    match value {
        Value::Null | Value::Bool(_) | Value::Number(_) | Value::String(_) => {
            out.push_str(&value.to_string());
        }
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(item, out);
            }
            out.push(']');
        }
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort_unstable();
            out.push('{');
            for (i, key) in keys.into_iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                out.push_str(&Value::String(key.clone()).to_string());
                out.push(':');
                write_canonical(&map[key], out);
            }
            out.push('}');
        }
    }
}
