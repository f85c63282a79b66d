//! Host and contract types

use serde::{Deserialize, Serialize};
use skyvault_core::HostId;
use uuid::Uuid;

/// Price and duration terms a host advertises
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractTerms {
    /// Price per byte per block
    pub price_per_byte_block: u64,
    /// Longest contract the host accepts, in blocks
    pub max_duration: u64,
}

impl ContractTerms {
    /// Payment owed for storing `bytes` for `duration` blocks
    pub fn payment_for(&self, bytes: u64, duration: u64) -> u64 {
        self.price_per_byte_block
            .saturating_mul(bytes)
            .saturating_mul(duration)
    }
}

/// Snapshot of one host as returned by a registry query
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Host {
    pub id: HostId,
    pub address: String,
    pub public_key: [u8; 32],
    pub terms: ContractTerms,
}

impl Host {
    /// Build a host, deriving its ID from the public key
    pub fn new(address: impl Into<String>, public_key: [u8; 32], terms: ContractTerms) -> Self {
        Self {
            id: HostId::from_public_key(&public_key),
            address: address.into(),
            public_key,
            terms,
        }
    }
}

/// What a renter asks a host to agree to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractRequest {
    pub renter_id: Uuid,
    pub file_id: Uuid,
    pub shard_index: usize,
    pub shard_size: u64,
    pub duration: u64,
    pub payment: u64,
}

/// Agreement for one host to store one shard
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contract {
    pub id: Uuid,
    pub renter_id: Uuid,
    pub host_id: HostId,
    pub file_id: Uuid,
    pub shard_index: usize,
    pub duration: u64,
    pub payment: u64,
}

impl Contract {
    /// Contract a host issues on accepting `request`
    pub fn accept(host_id: HostId, request: &ContractRequest) -> Self {
        Self {
            id: Uuid::new_v4(),
            renter_id: request.renter_id,
            host_id,
            file_id: request.file_id,
            shard_index: request.shard_index,
            duration: request.duration,
            payment: request.payment,
        }
    }
}
