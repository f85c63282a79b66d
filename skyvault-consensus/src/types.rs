//! Block header, target and height types
//!
//! Headers serialize to a fixed 80-byte little-endian layout:
//!
//! ```text
//! parent_id   [0..32]
//! nonce       [32..40]
//! timestamp   [40..48]
//! merkle_root [48..80]
//! ```
//!
//! The block ID is the Blake3 hash of those bytes.

use serde::{Deserialize, Serialize};
use skyvault_core::ContentHash;
use std::fmt;

/// Height of a block in the chain (genesis = 0)
pub type BlockHeight = u64;

/// Serialized header size in bytes
pub const HEADER_SIZE: usize = 80;

/// Offset of the nonce in the serialized header
pub const NONCE_OFFSET: usize = 32;

const TIMESTAMP_OFFSET: usize = NONCE_OFFSET + 8;
const MERKLE_OFFSET: usize = TIMESTAMP_OFFSET + 8;

/// Coinbase paid by the first block
pub const INITIAL_COINBASE: u64 = 300_000;

/// Floor the coinbase decays to
pub const MINIMUM_COINBASE: u64 = 30_000;

/// Block subsidy at `height`, decaying by one coin per block
pub fn block_subsidy(height: BlockHeight) -> u64 {
    INITIAL_COINBASE
        .saturating_sub(height)
        .max(MINIMUM_COINBASE)
}

/// Block identifier
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct BlockId([u8; 32]);

impl BlockId {
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl fmt::Debug for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BlockId({})", &hex::encode(self.0)[..16])
    }
}

impl fmt::Display for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

/// Proof-of-work block header
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockHeader {
    pub parent_id: BlockId,
    pub nonce: u64,
    /// Unix timestamp in seconds
    pub timestamp: u64,
    pub merkle_root: [u8; 32],
}

impl BlockHeader {
    /// Serialize to the fixed 80-byte layout
    pub fn to_bytes(&self) -> [u8; HEADER_SIZE] {
        let mut bytes = [0u8; HEADER_SIZE];
        bytes[..NONCE_OFFSET].copy_from_slice(self.parent_id.as_bytes());
        bytes[NONCE_OFFSET..TIMESTAMP_OFFSET].copy_from_slice(&self.nonce.to_le_bytes());
        bytes[TIMESTAMP_OFFSET..MERKLE_OFFSET].copy_from_slice(&self.timestamp.to_le_bytes());
        bytes[MERKLE_OFFSET..].copy_from_slice(&self.merkle_root);
        bytes
    }

    /// Parse the fixed 80-byte layout
    pub fn from_bytes(bytes: &[u8; HEADER_SIZE]) -> Self {
        let mut parent = [0u8; 32];
        parent.copy_from_slice(&bytes[..NONCE_OFFSET]);
        let mut nonce = [0u8; 8];
        nonce.copy_from_slice(&bytes[NONCE_OFFSET..TIMESTAMP_OFFSET]);
        let mut timestamp = [0u8; 8];
        timestamp.copy_from_slice(&bytes[TIMESTAMP_OFFSET..MERKLE_OFFSET]);
        let mut merkle_root = [0u8; 32];
        merkle_root.copy_from_slice(&bytes[MERKLE_OFFSET..]);

        Self {
            parent_id: BlockId(parent),
            nonce: u64::from_le_bytes(nonce),
            timestamp: u64::from_le_bytes(timestamp),
            merkle_root,
        }
    }

    /// Hash of the serialized header
    pub fn id(&self) -> BlockId {
        BlockId(*ContentHash::compute(&self.to_bytes()).as_bytes())
    }
}

/// Serialized header whose nonce can be rewritten in place
///
/// The nonce search hashes this buffer directly instead of re-serializing
/// the whole header for every candidate.
#[derive(Clone)]
pub struct HeaderBuffer {
    bytes: [u8; HEADER_SIZE],
}

impl HeaderBuffer {
    pub fn new(header: &BlockHeader) -> Self {
        Self {
            bytes: header.to_bytes(),
        }
    }

    /// Write `nonce` into the nonce slot
    #[inline]
    pub fn set_nonce(&mut self, nonce: u64) {
        self.bytes[NONCE_OFFSET..TIMESTAMP_OFFSET].copy_from_slice(&nonce.to_le_bytes());
    }

    /// Hash of the buffer in its current state
    #[inline]
    pub fn hash(&self) -> [u8; 32] {
        *ContentHash::compute(&self.bytes).as_bytes()
    }

    pub fn as_bytes(&self) -> &[u8; HEADER_SIZE] {
        &self.bytes
    }

    pub fn to_header(&self) -> BlockHeader {
        BlockHeader::from_bytes(&self.bytes)
    }
}

/// Proof-of-work threshold
///
/// A hash meets the target when, read as a big-endian unsigned integer, it
/// is less than or equal to the target.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Target([u8; 32]);

impl Target {
    /// Every hash meets this target
    pub const MAX: Target = Target([0xFF; 32]);

    /// Only the all-zero hash meets this target
    pub const ZERO: Target = Target([0u8; 32]);

    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Target requiring `bits` leading zero bits (expected 2^bits attempts)
    pub fn from_leading_zero_bits(bits: u32) -> Self {
        let mut bytes = [0xFFu8; 32];
        let bits = bits.min(256) as usize;
        for (i, byte) in bytes.iter_mut().enumerate() {
            let start = i * 8;
            if bits >= start + 8 {
                *byte = 0;
            } else if bits > start {
                *byte = 0xFF >> (bits - start);
            }
        }
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Whether `hash` is valid proof-of-work for this target
    #[inline]
    pub fn meets(&self, hash: &[u8; 32]) -> bool {
        // Lexicographic order on equal-length arrays is big-endian integer order
        hash <= &self.0
    }
}

impl fmt::Debug for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Target({})", hex::encode(self.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_header() -> BlockHeader {
        BlockHeader {
            parent_id: BlockId::from_bytes([1u8; 32]),
            nonce: 0x0102_0304_0506_0708,
            timestamp: 1_700_000_000,
            merkle_root: [9u8; 32],
        }
    }

    #[test]
    fn test_header_layout() {
        let header = sample_header();
        let bytes = header.to_bytes();
        assert_eq!(&bytes[..32], &[1u8; 32]);
        assert_eq!(&bytes[32..40], &header.nonce.to_le_bytes());
        assert_eq!(&bytes[40..48], &header.timestamp.to_le_bytes());
        assert_eq!(&bytes[48..], &[9u8; 32]);
        assert_eq!(BlockHeader::from_bytes(&bytes), header);
    }

    #[test]
    fn test_set_nonce_matches_reserialization() {
        let header = sample_header();
        let mut buffer = HeaderBuffer::new(&header);
        buffer.set_nonce(77);

        let mut expected = header;
        expected.nonce = 77;
        assert_eq!(buffer.as_bytes(), &expected.to_bytes());
        assert_eq!(buffer.hash(), *expected.id().as_bytes());
        assert_eq!(buffer.to_header(), expected);
    }

    #[test]
    fn test_target_leading_zero_bits() {
        assert_eq!(Target::from_leading_zero_bits(0), Target::MAX);
        assert_eq!(Target::from_leading_zero_bits(256), Target::ZERO);

        let t = Target::from_leading_zero_bits(12);
        assert_eq!(t.as_bytes()[0], 0x00);
        assert_eq!(t.as_bytes()[1], 0x0F);
        assert_eq!(t.as_bytes()[2], 0xFF);
    }

    #[test]
    fn test_target_comparison_is_big_endian() {
        let target = Target::from_leading_zero_bits(8);
        let mut hash = [0xFFu8; 32];
        assert!(!target.meets(&hash));
        hash[0] = 0x00;
        assert!(target.meets(&hash));
        hash[0] = 0x01;
        hash[1..].fill(0);
        assert!(!target.meets(&hash));

        assert!(Target::MAX.meets(&[0xFF; 32]));
        assert!(Target::ZERO.meets(&[0u8; 32]));
        let mut tiny = [0u8; 32];
        tiny[31] = 1;
        assert!(!Target::ZERO.meets(&tiny));
    }

    #[test]
    fn test_block_subsidy_schedule() {
        assert_eq!(block_subsidy(0), 300_000);
        assert_eq!(block_subsidy(1), 299_999);
        assert_eq!(block_subsidy(270_000), 30_000);
        assert_eq!(block_subsidy(1_000_000), 30_000);
    }
}
