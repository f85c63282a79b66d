//! Host identifiers and file manifests
//!
//! A `FileManifest` records everything needed to rebuild an uploaded file:
//! the erasure parameters, the padding that was added, and which host holds
//! which shard.

use crate::crypto::ContentHash;
use crate::erasure::ErasureConfig;
use crate::error::{Result, VaultError};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::path::Path;
use uuid::Uuid;

/// Host identifier
///
/// Derived from the host's public key with Blake3.
/// Displayed base58, e.g. `2DrjgbN3Y5AHN4inRXnff2MrzqXJC1JYopNtXmMTBCry`
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HostId([u8; 32]);

impl HostId {
    /// Create a new HostId from raw bytes
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Derive the ID of the host owning `public_key`
    pub fn from_public_key(public_key: &[u8]) -> Self {
        Self(*ContentHash::compute(public_key).as_bytes())
    }

    /// Get the raw bytes
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Convert to base58 string
    pub fn to_base58(&self) -> String {
        bs58::encode(&self.0).into_string()
    }

    /// Parse from base58 string
    pub fn from_base58(s: &str) -> Result<Self> {
        let bytes = bs58::decode(s)
            .into_vec()
            .map_err(|e| VaultError::InvalidHostId(e.to_string()))?;

        if bytes.len() != 32 {
            return Err(VaultError::InvalidHostId(format!(
                "Invalid length: expected 32, got {}",
                bytes.len()
            )));
        }

        let mut arr = [0u8; 32];
        arr.copy_from_slice(&bytes);
        Ok(Self(arr))
    }
}

impl fmt::Debug for HostId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "HostId({})", &self.to_base58()[..8])
    }
}

impl fmt::Display for HostId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_base58())
    }
}

impl Serialize for HostId {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_base58())
    }
}

impl<'de> Deserialize<'de> for HostId {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Self::from_base58(&s).map_err(serde::de::Error::custom)
    }
}

/// Key under which a host stores one shard of one file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ShardKey {
    pub file_id: Uuid,
    pub shard_index: usize,
}

impl ShardKey {
    pub fn new(file_id: Uuid, shard_index: usize) -> Self {
        Self {
            file_id,
            shard_index,
        }
    }
}

impl fmt::Display for ShardKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.file_id, self.shard_index)
    }
}

/// One shard stored on one host
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Placement {
    pub host_id: HostId,
    pub shard_index: usize,
    /// Blake3 checksum of the shard as uploaded
    pub checksum: ContentHash,
}

/// Everything needed to attempt a download
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileManifest {
    pub file_id: Uuid,
    pub original_length: u64,
    pub padding_length: u64,
    pub data_pieces: usize,
    pub parity_pieces: usize,
    pub shard_size: u64,
    pub placements: Vec<Placement>,
}

impl FileManifest {
    /// Create an empty manifest for an encoded file
    pub fn new(
        file_id: Uuid,
        config: ErasureConfig,
        original_length: u64,
        padding_length: u64,
        shard_size: u64,
    ) -> Self {
        Self {
            file_id,
            original_length,
            padding_length,
            data_pieces: config.data_shards,
            parity_pieces: config.parity_shards,
            shard_size,
            placements: Vec::new(),
        }
    }

    /// Erasure parameters of this file
    pub fn erasure_config(&self) -> Result<ErasureConfig> {
        ErasureConfig::new(self.data_pieces, self.parity_pieces)
    }

    /// Total number of shards the file was encoded into
    pub fn total_pieces(&self) -> usize {
        self.data_pieces + self.parity_pieces
    }

    /// Key of shard `index` on any host
    pub fn shard_key(&self, index: usize) -> ShardKey {
        ShardKey::new(self.file_id, index)
    }

    /// Record a completed placement
    pub fn add_placement(&mut self, placement: Placement) {
        self.placements.push(placement);
    }

    /// Number of distinct shard indices placed on some host
    pub fn placed_pieces(&self) -> usize {
        self.placements
            .iter()
            .map(|p| p.shard_index)
            .collect::<HashSet<_>>()
            .len()
    }

    /// Whether enough distinct shards are placed to reconstruct the file
    pub fn is_recoverable(&self) -> bool {
        self.placed_pieces() >= self.data_pieces
    }

    /// Check internal consistency before attempting a download
    pub fn validate(&self) -> Result<()> {
        let config = self.erasure_config()?;

        let capacity = self
            .shard_size
            .checked_mul(config.data_shards as u64)
            .ok_or_else(|| {
                VaultError::InvalidManifest(format!(
                    "{} shards of {} bytes overflow",
                    config.data_shards, self.shard_size
                ))
            })?;
        let padded = self
            .original_length
            .checked_add(self.padding_length)
            .ok_or_else(|| {
                VaultError::InvalidManifest(format!(
                    "length {} + padding {} overflows",
                    self.original_length, self.padding_length
                ))
            })?;
        if padded != capacity {
            return Err(VaultError::InvalidManifest(format!(
                "length {} + padding {} does not match {} shards of {} bytes",
                self.original_length, self.padding_length, config.data_shards, self.shard_size
            )));
        }

        if let Some(p) = self
            .placements
            .iter()
            .find(|p| p.shard_index >= config.total_shards())
        {
            return Err(VaultError::InvalidShardIndex {
                index: p.shard_index,
                max: config.total_shards() - 1,
            });
        }

        Ok(())
    }

    /// Serialize to pretty JSON
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Parse from JSON
    pub fn from_json(json: &str) -> Result<Self> {
        let manifest: FileManifest = serde_json::from_str(json)?;
        manifest.validate()?;
        Ok(manifest)
    }

    /// Write the manifest to disk as JSON
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        std::fs::write(path, self.to_json()?)?;
        Ok(())
    }

    /// Load a manifest from a JSON file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json(&content)
    }
}
