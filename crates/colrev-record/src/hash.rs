//! Record content hashing
//!
//! [`ContentHash`] is a Blake3 digest over a record's canonical JSON form. The
//! dataset compares hashes to detect records that changed between loads.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

/// A 32-byte Blake3 hash of record content
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct ContentHash([u8; 32]);

impl ContentHash {
    /// Wrap raw bytes
    #[inline]
    #[must_use]
    pub const fn new(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Underlying bytes
    #[inline]
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Hash of arbitrary bytes
    #[inline]
    #[must_use]
    pub fn compute(data: &[u8]) -> Self {
        Self(*blake3::hash(data).as_bytes())
    }

    /// Hash of a value's JSON encoding
    ///
    /// # Errors
    /// Returns error if serialization fails
    pub fn compute_serializable<T: Serialize>(value: &T) -> Result<Self, HashError> {
        let json = serde_json::to_vec(value)?;
        Ok(Self::compute(&json))
    }

    /// First 16 hex chars, for log lines
    #[inline]
    #[must_use]
    pub fn short(&self) -> String {
        hex::encode(&self.0[..8])
    }
}

impl Display for ContentHash {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

impl FromStr for ContentHash {
    type Err = HashError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = hex::decode(s)?;
        let arr: [u8; 32] = bytes
            .as_slice()
            .try_into()
            .map_err(|_| HashError::InvalidLength {
                expected: 32,
                actual: bytes.len(),
            })?;
        Ok(Self(arr))
    }
}

impl Serialize for ContentHash {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for ContentHash {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Errors that can occur when working with content hashes
#[derive(Debug, thiserror::Error)]
pub enum HashError {
    /// Invalid hash length
    #[error("invalid hash length: expected {expected}, got {actual}")]
    InvalidLength {
        /// Expected byte count
        expected: usize,
        /// Actual byte count
        actual: usize,
    },

    /// Hex encoding error
    #[error("hex decode error: {0}")]
    HexDecode(#[from] hex::FromHexError),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compute_is_deterministic() {
        assert_eq!(ContentHash::compute(b"record"), ContentHash::compute(b"record"));
        assert_ne!(ContentHash::compute(b"a"), ContentHash::compute(b"b"));
    }

    #[test]
    fn display_and_parse() {
        let hash = ContentHash::compute(b"test");
        let parsed: ContentHash = hash.to_string().parse().unwrap();
        assert_eq!(hash, parsed);
        assert!(hash.to_string().starts_with(&hash.short()));
    }

    #[test]
    fn parse_rejects_short_input() {
        let result = "abcd".parse::<ContentHash>();
        assert!(matches!(
            result,
            Err(HashError::InvalidLength { expected: 32, actual: 2 })
        ));
    }

    #[test]
    fn serde_uses_hex() {
        let hash = ContentHash::compute(b"test");
        let json = serde_json::to_string(&hash).unwrap();
        assert_eq!(json.len(), 66);
        let decoded: ContentHash = serde_json::from_str(&json).unwrap();
        assert_eq!(hash, decoded);
    }
}
