//! Reed-Solomon Erasure Coding
//!
//! Systematic (d, p) coding over GF(2^8):
//! - d data shards hold the file bytes, zero-padded to equal length
//! - p parity shards are computed from the data shards
//! - any d of the d+p shards reconstruct the file exactly
//!
//! `p = 0` is allowed; the data shards are then stored as-is and every one
//! of them is required for reconstruction.

use crate::crypto::ContentHash;
use crate::error::{Result, VaultError};
use crate::MAX_TOTAL_SHARDS;
use bytes::Bytes;
use rayon::prelude::*;
use reed_solomon_erasure::galois_8::ReedSolomon;
use serde::{Deserialize, Serialize};

/// Shards at least this large are checksummed with blake3's rayon hasher
const PARALLEL_HASH_THRESHOLD: usize = 128 * 1024;

/// Erasure coding configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErasureConfig {
    /// Number of data shards (d)
    pub data_shards: usize,
    /// Number of parity shards (p)
    pub parity_shards: usize,
}

impl ErasureConfig {
    /// Create a new erasure config
    pub fn new(data_shards: usize, parity_shards: usize) -> Result<Self> {
        if data_shards == 0 {
            return Err(VaultError::Configuration(
                "data_shards must be > 0".to_string(),
            ));
        }
        if data_shards + parity_shards > MAX_TOTAL_SHARDS {
            return Err(VaultError::Configuration(format!(
                "data_shards + parity_shards must be <= {}, got {}",
                MAX_TOTAL_SHARDS,
                data_shards + parity_shards
            )));
        }
        Ok(Self {
            data_shards,
            parity_shards,
        })
    }

    /// Total number of shards
    pub fn total_shards(&self) -> usize {
        self.data_shards + self.parity_shards
    }

    /// Storage overhead ratio (parity/data)
    pub fn overhead_ratio(&self) -> f64 {
        self.parity_shards as f64 / self.data_shards as f64
    }

    /// Maximum number of lost shards that can be tolerated
    pub fn max_failures(&self) -> usize {
        self.parity_shards
    }

    /// Size of every shard for a file of `data_len` bytes.
    ///
    /// Never zero, so empty files still produce addressable shards.
    pub fn shard_size_for(&self, data_len: usize) -> usize {
        data_len.div_ceil(self.data_shards).max(1)
    }

    /// Number of trailing zero bytes appended to fill the last data shard
    pub fn padding_for(&self, data_len: usize) -> usize {
        self.shard_size_for(data_len) * self.data_shards - data_len
    }
}

/// A single shard of erasure-coded data
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShardData {
    /// Shard index (0 to total_shards-1)
    pub index: usize,
    /// Shard data
    pub data: Bytes,
    /// Whether this is a parity shard
    pub is_parity: bool,
    /// Blake3 checksum of `data`
    pub checksum: ContentHash,
}

impl ShardData {
    /// Wrap shard bytes and checksum them
    pub fn new(index: usize, data: Bytes, is_parity: bool) -> Self {
        let checksum = if data.len() >= PARALLEL_HASH_THRESHOLD {
            ContentHash::compute_parallel(&data)
        } else {
            ContentHash::compute(&data)
        };
        Self {
            index,
            data,
            is_parity,
            checksum,
        }
    }

    /// Get shard size
    pub fn size(&self) -> usize {
        self.data.len()
    }

    /// Check the shard bytes against its checksum
    pub fn verify(&self) -> bool {
        self.checksum.verify(&self.data)
    }
}

/// Output of encoding one file
#[derive(Debug, Clone)]
pub struct EncodedFile {
    /// Data shards followed by parity shards, indexed 0..d+p
    pub shards: Vec<ShardData>,
    /// Size of every shard in bytes
    pub shard_size: usize,
    /// Length of the input before padding
    pub original_len: usize,
    /// Zero bytes appended to the last data shard
    pub padding_len: usize,
}

/// Reed-Solomon encoder/decoder
pub struct ErasureEncoder {
    config: ErasureConfig,
    // None when parity_shards == 0
    encoder: Option<ReedSolomon>,
}

impl ErasureEncoder {
    /// Create a new encoder for the given configuration
    pub fn with_config(config: ErasureConfig) -> Result<Self> {
        let encoder = if config.parity_shards == 0 {
            None
        } else {
            Some(ReedSolomon::new(config.data_shards, config.parity_shards)?)
        };
        Ok(Self { config, encoder })
    }

    /// Create a new encoder for `data_shards` + `parity_shards`
    pub fn new(data_shards: usize, parity_shards: usize) -> Result<Self> {
        Self::with_config(ErasureConfig::new(data_shards, parity_shards)?)
    }

    /// Get the erasure configuration
    pub fn config(&self) -> &ErasureConfig {
        &self.config
    }

    /// Encode data into shards
    ///
    /// Returns the data + parity shards together with the padding applied.
    pub fn encode(&self, data: &[u8]) -> Result<EncodedFile> {
        let shard_size = self.config.shard_size_for(data.len());

        // Pad data to be evenly divisible by data_shards
        let padded_size = shard_size * self.config.data_shards;
        let mut padded_data = data.to_vec();
        padded_data.resize(padded_size, 0);

        // Split into data shards
        let mut shards: Vec<Vec<u8>> = padded_data
            .chunks(shard_size)
            .map(|c| c.to_vec())
            .collect();

        self.fill_parity(&mut shards, shard_size)?;

        let shards = shards
            .into_iter()
            .enumerate()
            .map(|(i, shard_data)| {
                let is_parity = i >= self.config.data_shards;
                ShardData::new(i, Bytes::from(shard_data), is_parity)
            })
            .collect();

        Ok(EncodedFile {
            shards,
            shard_size,
            original_len: data.len(),
            padding_len: padded_size - data.len(),
        })
    }

    /// Encode data into shards using parallel processing
    ///
    /// More efficient for large files (> 1MB); produces identical shards.
    pub fn encode_parallel(&self, data: &[u8]) -> Result<EncodedFile> {
        let shard_size = self.config.shard_size_for(data.len());

        let padded_size = shard_size * self.config.data_shards;
        let mut padded_data = data.to_vec();
        padded_data.resize(padded_size, 0);

        let mut shards: Vec<Vec<u8>> = padded_data
            .par_chunks(shard_size)
            .map(|c| c.to_vec())
            .collect();

        self.fill_parity(&mut shards, shard_size)?;

        // Checksums dominate for large shards, hash them in parallel
        let data_shards = self.config.data_shards;
        let shards = shards
            .into_par_iter()
            .enumerate()
            .map(|(i, shard_data)| ShardData::new(i, Bytes::from(shard_data), i >= data_shards))
            .collect();

        Ok(EncodedFile {
            shards,
            shard_size,
            original_len: data.len(),
            padding_len: padded_size - data.len(),
        })
    }

    fn fill_parity(&self, shards: &mut Vec<Vec<u8>>, shard_size: usize) -> Result<()> {
        if let Some(encoder) = &self.encoder {
            for _ in 0..self.config.parity_shards {
                shards.push(vec![0u8; shard_size]);
            }
            encoder.encode(shards)?;
        }
        Ok(())
    }

    /// Decode shards back into original data
    ///
    /// Requires at least `data_shards` shards present; missing shards are
    /// represented as `None`. The result is truncated to `original_size`.
    pub fn decode(&self, shards: &[Option<ShardData>], original_size: usize) -> Result<Bytes> {
        let total_shards = self.config.total_shards();

        if shards.len() != total_shards {
            return Err(VaultError::ShardSizeMismatch {
                expected: total_shards,
                actual: shards.len(),
            });
        }

        let available = shards.iter().filter(|s| s.is_some()).count();
        if available < self.config.data_shards {
            return Err(VaultError::InsufficientShards {
                available,
                required: self.config.data_shards,
            });
        }

        // Determine shard size from available shards
        let shard_size = shards
            .iter()
            .find_map(|s| s.as_ref().map(|s| s.size()))
            .ok_or(VaultError::InsufficientShards {
                available: 0,
                required: self.config.data_shards,
            })?;

        if let Some(bad) = shards.iter().flatten().find(|s| s.size() != shard_size) {
            return Err(VaultError::ShardSizeMismatch {
                expected: shard_size,
                actual: bad.size(),
            });
        }

        if original_size > shard_size * self.config.data_shards {
            return Err(VaultError::InvalidManifest(format!(
                "original size {} exceeds encoded capacity {}",
                original_size,
                shard_size * self.config.data_shards
            )));
        }

        let mut shard_vecs: Vec<Option<Vec<u8>>> = shards
            .iter()
            .map(|opt| opt.as_ref().map(|s| s.data.to_vec()))
            .collect();

        match &self.encoder {
            Some(encoder) => encoder.reconstruct_data(&mut shard_vecs)?,
            None => {
                // Without parity every data shard has to be present
                let present = shard_vecs.iter().filter(|s| s.is_some()).count();
                if present < self.config.data_shards {
                    return Err(VaultError::InsufficientShards {
                        available: present,
                        required: self.config.data_shards,
                    });
                }
            }
        }

        // Extract data shards and concatenate
        let mut result = Vec::with_capacity(shard_size * self.config.data_shards);
        for shard_opt in shard_vecs.iter().take(self.config.data_shards) {
            match shard_opt {
                Some(shard) => result.extend_from_slice(shard),
                None => return Err(VaultError::Internal("Reconstruction failed".to_string())),
            }
        }

        // Strip padding
        result.truncate(original_size);
        Ok(Bytes::from(result))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn to_opts(encoded: EncodedFile) -> Vec<Option<ShardData>> {
        encoded.shards.into_iter().map(Some).collect()
    }

    #[test]
    fn test_erasure_config() {
        let config = ErasureConfig::new(10, 4).unwrap();
        assert_eq!(config.total_shards(), 14);
        assert_eq!(config.max_failures(), 4);
        assert!((config.overhead_ratio() - 0.4).abs() < 0.001);
    }

    #[test]
    fn test_config_rejects_zero_data_shards() {
        assert!(matches!(
            ErasureConfig::new(0, 2),
            Err(VaultError::Configuration(_))
        ));
        assert!(ErasureConfig::new(200, 57).is_err());
        assert!(ErasureConfig::new(200, 56).is_ok());
    }

    #[test]
    fn test_padding_accounting() {
        let config = ErasureConfig::new(3, 2).unwrap();
        assert_eq!(config.shard_size_for(100), 34);
        assert_eq!(config.padding_for(100), 2);
        assert_eq!(config.shard_size_for(0), 1);
        assert_eq!(config.padding_for(0), 3);
    }

    #[test]
    fn test_encode_decode_simple() {
        let encoder = ErasureEncoder::new(10, 4).unwrap();
        let original = b"Hello, SkyVault!";

        let encoded = encoder.encode(original).unwrap();
        assert_eq!(encoded.shards.len(), 14);
        assert_eq!(encoded.original_len, original.len());
        assert_eq!(
            encoded.shard_size * 10 - encoded.padding_len,
            original.len()
        );

        let decoded = encoder.decode(&to_opts(encoded), original.len()).unwrap();
        assert_eq!(decoded.as_ref(), original);
    }

    #[test]
    fn test_encode_decode_with_missing_shards() {
        let encoder = ErasureEncoder::new(10, 4).unwrap();
        let original: Vec<u8> = (0..1024 * 1024).map(|i| (i % 251) as u8).collect();

        let encoded = encoder.encode(&original).unwrap();

        // Remove 4 shards (maximum we can lose)
        let mut shard_opts = to_opts(encoded);
        shard_opts[0] = None;
        shard_opts[5] = None;
        shard_opts[10] = None;
        shard_opts[13] = None;

        let decoded = encoder.decode(&shard_opts, original.len()).unwrap();
        assert_eq!(decoded.as_ref(), original.as_slice());
    }

    #[test]
    fn test_too_many_missing_shards() {
        let encoder = ErasureEncoder::new(10, 4).unwrap();
        let original = b"test data";

        let mut shard_opts = to_opts(encoder.encode(original).unwrap());
        for shard in shard_opts.iter_mut().take(5) {
            *shard = None;
        }

        let result = encoder.decode(&shard_opts, original.len());
        assert!(matches!(
            result,
            Err(VaultError::InsufficientShards { .. })
        ));
    }

    #[test]
    fn test_single_data_shard_replicates() {
        // d=1 turns every parity shard into a full copy of the file
        let encoder = ErasureEncoder::new(1, 4).unwrap();
        let original = vec![9u8; 100];
        let encoded = encoder.encode(&original).unwrap();
        assert_eq!(encoded.padding_len, 0);

        let mut shard_opts = to_opts(encoded);
        for shard in shard_opts.iter_mut().take(4) {
            *shard = None;
        }
        let decoded = encoder.decode(&shard_opts, original.len()).unwrap();
        assert_eq!(decoded.as_ref(), original.as_slice());
    }

    #[test]
    fn test_no_parity() {
        let encoder = ErasureEncoder::new(3, 0).unwrap();
        let original = b"no parity at all";
        let encoded = encoder.encode(original).unwrap();
        assert_eq!(encoded.shards.len(), 3);

        let mut shard_opts = to_opts(encoded);
        let decoded = encoder.decode(&shard_opts, original.len()).unwrap();
        assert_eq!(decoded.as_ref(), original);

        shard_opts[1] = None;
        assert!(matches!(
            encoder.decode(&shard_opts, original.len()),
            Err(VaultError::InsufficientShards { .. })
        ));
    }

    #[test]
    fn test_empty_input() {
        let encoder = ErasureEncoder::new(3, 2).unwrap();
        let encoded = encoder.encode(&[]).unwrap();
        assert_eq!(encoded.shard_size, 1);
        assert_eq!(encoded.padding_len, 3);

        let decoded = encoder.decode(&to_opts(encoded), 0).unwrap();
        assert!(decoded.is_empty());
    }

    #[test]
    fn test_encode_parallel() {
        let encoder = ErasureEncoder::new(10, 4).unwrap();
        let original = vec![42u8; 10 * 1024 * 1024];

        let seq = encoder.encode(&original).unwrap();
        let par = encoder.encode_parallel(&original).unwrap();

        assert_eq!(seq.shard_size, par.shard_size);
        assert_eq!(seq.padding_len, par.padding_len);
        for (s1, s2) in seq.shards.iter().zip(par.shards.iter()) {
            assert_eq!(s1.data, s2.data);
            assert_eq!(s1.index, s2.index);
            assert_eq!(s1.is_parity, s2.is_parity);
            assert_eq!(s1.checksum, s2.checksum);
        }
    }

    #[test]
    fn test_corrupted_shard_fails_checksum() {
        let encoder = ErasureEncoder::new(3, 2).unwrap();
        let encoded = encoder.encode(b"verify test").unwrap();
        assert!(encoded.shards.iter().all(|s| s.verify()));

        let mut corrupted = encoded.shards[0].clone();
        let mut data = corrupted.data.to_vec();
        data[0] ^= 0xFF;
        corrupted.data = Bytes::from(data);
        assert!(!corrupted.verify());
    }

    #[test]
    fn test_shard_indices() {
        let encoder = ErasureEncoder::new(3, 2).unwrap();
        let encoded = encoder.encode(b"index test").unwrap();

        for (i, shard) in encoded.shards.iter().enumerate() {
            assert_eq!(shard.index, i);
            assert_eq!(shard.is_parity, i >= 3);
            assert!(shard.verify());
        }
    }

    proptest! {
        #[test]
        fn prop_any_d_shards_reconstruct(
            data in proptest::collection::vec(any::<u8>(), 0..2048),
            d in 1usize..6,
            p in 0usize..4,
            seed in any::<u64>(),
        ) {
            let encoder = ErasureEncoder::new(d, p).unwrap();
            let mut shard_opts = to_opts(encoder.encode(&data).unwrap());

            // Drop exactly p shards chosen from the seed
            let mut dropped = 0;
            let mut i = (seed as usize) % (d + p);
            while dropped < p {
                if shard_opts[i].is_some() {
                    shard_opts[i] = None;
                    dropped += 1;
                }
                i = (i + 1) % (d + p);
            }

            let decoded = encoder.decode(&shard_opts, data.len()).unwrap();
            prop_assert_eq!(decoded.as_ref(), data.as_slice());
        }
    }
}
