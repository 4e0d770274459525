//! Content hashing for candidates
//!
//! Provides [`CandidateHash`], a strongly-typed 32-byte Blake3 digest of a
//! candidate's identity: its source text, declared kind and profile. The
//! iteration controller compares hashes to detect a generator resubmitting
//! identical input.

use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

/// A 32-byte content hash (Blake3) of a candidate
///
/// Immutable and cheap to clone (Copy).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CandidateHash([u8; 32]);

impl CandidateHash {
    /// Create a new hash from raw bytes
    #[inline]
    #[must_use]
    pub const fn new(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Get reference to the underlying bytes
    #[inline]
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Create hash from byte slice
    ///
    /// # Errors
    /// Returns error if slice length is not exactly 32 bytes
    #[inline]
    pub fn from_slice(bytes: &[u8]) -> Result<Self, HashError> {
        let arr: [u8; 32] = bytes.try_into().map_err(|_| HashError::InvalidLength {
            expected: 32,
            actual: bytes.len(),
        })?;
        Ok(Self(arr))
    }

    /// Compute Blake3 hash of candidate text
    #[inline]
    #[must_use]
    pub fn of_text(text: &str) -> Self {
        Self::new(*blake3::hash(text.as_bytes()).as_bytes())
    }

    /// Compute Blake3 hash over several fields
    ///
    /// Each field is length-prefixed, so `["ab", "c"]` and `["a", "bc"]`
    /// differ.
    #[must_use]
    pub fn of_fields(fields: &[&str]) -> Self {
        let mut hasher = blake3::Hasher::new();
        for field in fields {
            hasher.update(&(field.len() as u64).to_le_bytes());
            hasher.update(field.as_bytes());
        }
        Self::new(*hasher.finalize().as_bytes())
    }

    /// Short string representation (first 16 hex chars)
    #[inline]
    #[must_use]
    pub fn short(&self) -> String {
        hex::encode(&self.0[..8])
    }
}

impl Display for CandidateHash {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

impl FromStr for CandidateHash {
    type Err = HashError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = hex::decode(s)?;
        Self::from_slice(&bytes)
    }
}

impl serde::Serialize for CandidateHash {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> serde::Deserialize<'de> for CandidateHash {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = <String as serde::Deserialize>::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Errors related to hash parsing
#[derive(Debug, thiserror::Error)]
pub enum HashError {
    /// Wrong number of bytes
    #[error("invalid hash length: expected {expected}, got {actual}")]
    InvalidLength {
        /// Expected byte count
        expected: usize,
        /// Actual byte count
        actual: usize,
    },

    /// Not valid hex
    #[error("invalid hex: {0}")]
    InvalidHex(#[from] hex::FromHexError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_is_deterministic() {
        let a = CandidateHash::of_text("def solve():\n    return 1\n");
        let b = CandidateHash::of_text("def solve():\n    return 1\n");
        assert_eq!(a, b);
    }

    #[test]
    fn hash_is_sensitive_to_whitespace() {
        let a = CandidateHash::of_text("x = 1");
        let b = CandidateHash::of_text("x = 1 ");
        assert_ne!(a, b);
    }

    #[test]
    fn field_boundaries_matter() {
        assert_ne!(
            CandidateHash::of_fields(&["ab", "c"]),
            CandidateHash::of_fields(&["a", "bc"])
        );
        assert_eq!(
            CandidateHash::of_fields(&["x", "library"]),
            CandidateHash::of_fields(&["x", "library"])
        );
    }

    #[test]
    fn hash_display_roundtrip() {
        let hash = CandidateHash::of_text("print('hi')");
        let parsed: CandidateHash = hash.to_string().parse().unwrap();
        assert_eq!(hash, parsed);
        assert_eq!(hash.short().len(), 16);
    }

    #[test]
    fn from_slice_rejects_wrong_length() {
        let err = CandidateHash::from_slice(&[0u8; 12]).unwrap_err();
        assert!(matches!(
            err,
            HashError::InvalidLength {
                expected: 32,
                actual: 12
            }
        ));
    }
}
