//! Error types for SkyVault core
//!
//! Provides a unified error type for erasure coding, hashing and manifests.

use thiserror::Error;

/// Result type alias for core operations
pub type Result<T> = std::result::Result<T, VaultError>;

/// Unified error type for the core crate
#[derive(Error, Debug)]
pub enum VaultError {
    // ===== Erasure Coding Errors =====
    #[error("Erasure coding error: {0}")]
    ErasureCoding(String),

    #[error("Insufficient shards: have {available}, need {required}")]
    InsufficientShards { available: usize, required: usize },

    #[error("Shard size mismatch: expected {expected}, got {actual}")]
    ShardSizeMismatch { expected: usize, actual: usize },

    #[error("Invalid shard index: {index} (max: {max})")]
    InvalidShardIndex { index: usize, max: usize },

    #[error("Shard {index} failed checksum verification")]
    ChecksumMismatch { index: usize },

    // ===== Identifier Errors =====
    #[error("Invalid host ID: {0}")]
    InvalidHostId(String),

    #[error("Invalid hash: {0}")]
    InvalidHash(String),

    // ===== Manifest Errors =====
    #[error("Invalid manifest: {0}")]
    InvalidManifest(String),

    // ===== I/O Errors =====
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // ===== Serialization Errors =====
    #[error("Serialization error: {0}")]
    Serialization(String),

    // ===== Configuration Errors =====
    #[error("Configuration error: {0}")]
    Configuration(String),

    // ===== Generic Errors =====
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<reed_solomon_erasure::Error> for VaultError {
    fn from(err: reed_solomon_erasure::Error) -> Self {
        VaultError::ErasureCoding(err.to_string())
    }
}

impl From<serde_json::Error> for VaultError {
    fn from(err: serde_json::Error) -> Self {
        VaultError::Serialization(err.to_string())
    }
}
