//! SkyVault Core Library
//!
//! Core abstractions shared by the SkyVault node crates.
//! This crate provides:
//! - Reed-Solomon erasure coding with an arbitrary (data, parity) split
//! - Blake3 content hashing for shard checksums and block IDs
//! - Host and shard identifiers, and the `FileManifest` that maps shards to hosts
//! - Common error handling

pub mod crypto;
pub mod erasure;
pub mod error;
pub mod manifest;
pub mod metric_names;

pub use crypto::ContentHash;
pub use erasure::{EncodedFile, ErasureConfig, ErasureEncoder, ShardData};
pub use error::{Result, VaultError};
pub use manifest::{FileManifest, HostId, Placement, ShardKey};

/// Maximum number of shards (data + parity) a single file may be split into.
///
/// Bounded by the GF(2^8) field used by the Reed-Solomon coder.
pub const MAX_TOTAL_SHARDS: usize = 256;

/// Files at least this large are encoded with the rayon-backed encoder.
pub const PARALLEL_ENCODE_THRESHOLD: usize = 1024 * 1024; // 1 MB
