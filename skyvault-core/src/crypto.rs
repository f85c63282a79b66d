//! Content hashing for SkyVault
//!
//! Blake3 is used both for shard checksums and for block header IDs.

use crate::error::{Result, VaultError};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Size of a Blake3 digest in bytes
pub const HASH_SIZE: usize = 32;

/// Blake3 digest of a shard or serialized header
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct ContentHash(blake3::Hash);

impl ContentHash {
    pub fn compute(data: &[u8]) -> Self {
        Self(blake3::hash(data))
    }

    /// Same digest as [`compute`](Self::compute), hashed across the rayon pool
    pub fn compute_parallel(data: &[u8]) -> Self {
        let mut hasher = blake3::Hasher::new();
        hasher.update_rayon(data);
        Self(hasher.finalize())
    }

    pub fn as_bytes(&self) -> &[u8; HASH_SIZE] {
        self.0.as_bytes()
    }

    pub fn to_hex(&self) -> String {
        self.0.to_hex().to_string()
    }

    /// Parse a 64-character hex digest
    pub fn from_hex(hex: &str) -> Result<Self> {
        let hash =
            blake3::Hash::from_hex(hex).map_err(|e| VaultError::InvalidHash(e.to_string()))?;
        Ok(Self(hash))
    }

    /// Whether `data` hashes to this digest
    pub fn verify(&self, data: &[u8]) -> bool {
        // blake3::Hash equality is constant-time
        self.0 == blake3::hash(data)
    }
}

impl fmt::Debug for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ContentHash({})", &self.to_hex()[..16])
    }
}

impl fmt::Display for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

// Manifests are persisted as JSON, so hashes travel as hex strings.
impl Serialize for ContentHash {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for ContentHash {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let hex = String::deserialize(deserializer)?;
        Self::from_hex(&hex).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_verify() {
        let data = b"shard payload";
        let hash = ContentHash::compute(data);
        assert!(hash.verify(data));
        assert!(!hash.verify(b"shard payloaD"));
    }

    #[test]
    fn test_parallel_matches_serial() {
        let data = vec![7u8; 4 * 1024 * 1024];
        assert_eq!(
            ContentHash::compute(&data),
            ContentHash::compute_parallel(&data)
        );
    }

    #[test]
    fn test_hex_roundtrip() {
        let hash = ContentHash::compute(b"hex");
        let parsed = ContentHash::from_hex(&hash.to_hex()).unwrap();
        assert_eq!(hash, parsed);
        assert!(ContentHash::from_hex("not-hex").is_err());
    }

    #[test]
    fn test_serde_as_hex_string() {
        let hash = ContentHash::compute(b"json");
        let json = serde_json::to_string(&hash).unwrap();
        assert_eq!(json, format!("\"{}\"", hash.to_hex()));
        let back: ContentHash = serde_json::from_str(&json).unwrap();
        assert_eq!(back, hash);
    }
}
