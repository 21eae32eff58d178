//! Canonical hashing used throughout the core: peer coordinates,
//! transaction stamp/id derivation, and the coordinator's operations
//! hash. All of it bottoms out in SHA-256 over a deterministic byte
//! encoding so every node computes the same digest for the same input.

use serde::{de::Error as _, Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest, Sha256};

/// A 256-bit digest, also used directly as a ring coordinate.
/// Serializes as a hex string rather than a 32-element array so it reads
/// sanely in the JSON wire messages.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Hash32(pub [u8; 32]);

impl Serialize for Hash32 {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Hash32 {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let hex = String::deserialize(deserializer)?;
        if hex.len() != 64 {
            return Err(D::Error::custom("expected a 64-character hex string"));
        }
        let mut out = [0u8; 32];
        for (i, byte) in out.iter_mut().enumerate() {
            *byte = u8::from_str_radix(&hex[i * 2..i * 2 + 2], 16)
                .map_err(|_| D::Error::custom("invalid hex digit"))?;
        }
        Ok(Hash32(out))
    }
}

impl Hash32 {
    pub fn from_bytes(bytes: &[u8]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(bytes);
        let digest = hasher.finalize();
        let mut out = [0u8; 32];
        out.copy_from_slice(&digest);
        Hash32(out)
    }

    /// Hash of the canonical (sorted-key) JSON serialization of `value`.
    /// Used for the coordinator's operations hash and transaction/stamp ids,
    /// where the input is a Rust value rather than raw bytes.
    pub fn from_canonical_json<T: Serialize>(value: &T) -> crate::Result<Self> {
        let json = serde_json::to_value(value).map_err(crate::Error::new)?;
        let canonical = canonicalize(&json);
        Ok(Self::from_bytes(canonical.as_bytes()))
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        self.0.iter().map(|b| format!("{:02x}", b)).collect()
    }
}

impl std::fmt::Debug for Hash32 {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Hash32({})", self.to_hex())
    }
}

impl std::fmt::Display for Hash32 {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

/// Re-serialize a `serde_json::Value` with object keys sorted, recursively,
/// so the same logical value always produces the same byte string
/// regardless of field insertion order.
fn canonicalize(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            let mut out = String::from("{");
            for (i, k) in keys.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                out.push_str(&serde_json::to_string(k).unwrap());
                out.push(':');
                out.push_str(&canonicalize(&map[*k]));
            }
            out.push('}');
            out
        }
        serde_json::Value::Array(items) => {
            let mut out = String::from("[");
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                out.push_str(&canonicalize(item));
            }
            out.push(']');
            out
        }
        other => other.to_string(),
    }
}

/// A convenience hasher for combining several already-hashable fields into
/// one digest: used for TransactionStamp/Transaction id derivation.
pub fn combine(parts: &[&[u8]]) -> Hash32 {
    let mut hasher = Sha256::new();
    for p in parts {
        hasher.update((p.len() as u64).to_be_bytes());
        hasher.update(p);
    }
    let digest = hasher.finalize();
    let mut out = [0u8; 32];
    out.copy_from_slice(&digest);
    Hash32(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deterministic() {
        let a = Hash32::from_bytes(b"hello");
        let b = Hash32::from_bytes(b"hello");
        assert_eq!(a, b);
    }

    #[test]
    fn canonical_json_ignores_key_order() {
        let a = serde_json::json!({"a": 1, "b": 2});
        let b = serde_json::json!({"b": 2, "a": 1});
        assert_eq!(
            Hash32::from_canonical_json(&a).unwrap(),
            Hash32::from_canonical_json(&b).unwrap()
        );
    }

    #[test]
    fn combine_is_length_prefixed() {
        // "ab","c" and "a","bc" must not collide.
        let x = combine(&[b"ab", b"c"]);
        let y = combine(&[b"a", b"bc"]);
        assert_ne!(x, y);
    }
}
