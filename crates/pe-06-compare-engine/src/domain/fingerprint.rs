//! SHA-256 fingerprints over length-prefixed parts.
//!
//! Each part is prefixed with its byte length, so `["ab", "c"]` and
//! `["a", "bc"]` never collide. JSON values are fed in canonical form
//! (object keys sorted), independent of how the map was built.

use serde_json::Value;
use sha2::{Digest, Sha256};

#[derive(Default)]
pub struct Fingerprinter {
    hasher: Sha256,
}

impl Fingerprinter {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn feed(&mut self, part: &str) -> &mut Self {
        self.hasher.update((part.len() as u64).to_le_bytes());
        self.hasher.update(part.as_bytes());
        self
    }

    pub fn feed_value(&mut self, value: &Value) -> &mut Self {
        let mut out = String::new();
        canonical(value, &mut out);
        self.feed(&out)
    }

    #[must_use]
    pub fn finish(self) -> String {
        hex::encode(self.hasher.finalize())
    }
}

/// Serialize `value` with object keys in sorted order.
pub fn canonical(value: &Value, out: &mut String) {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            out.push('{');
            for (i, key) in keys.into_iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                out.push_str(&Value::String(key.clone()).to_string());
                out.push(':');
                canonical(&map[key], out);
            }
            out.push('}');
        }
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                canonical(item, out);
            }
            out.push(']');
        }
        scalar => out.push_str(&scalar.to_string()),
    }
}
