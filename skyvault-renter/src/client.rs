//! Host network capability
//!
//! Wire transport to hosts is supplied by the caller. The pipeline only
//! depends on this trait.

use crate::host::{Contract, ContractRequest, Host};
use async_trait::async_trait;
use bytes::Bytes;
use skyvault_core::{HostId, ShardKey};
use thiserror::Error;

/// Failure of a single host operation
///
/// These never fail a whole upload or download on their own; the pipeline
/// counts them against its threshold.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HostError {
    #[error("Host declined: {0}")]
    Declined(String),

    #[error("Host timed out")]
    Timeout,

    #[error("Shard not found: {0}")]
    NotFound(ShardKey),

    #[error("Host unreachable: {0}")]
    Unreachable(String),
}

/// Operations the renter consumes from the host network
#[async_trait]
pub trait HostNetworkClient: Send + Sync {
    /// Hosts currently accepting contracts
    async fn contractable_hosts(&self) -> Result<Vec<Host>, HostError>;

    /// Negotiate a storage contract with `host`
    async fn form_contract(
        &self,
        host: &Host,
        request: ContractRequest,
    ) -> Result<Contract, HostError>;

    /// Upload one shard under an existing contract
    async fn store_shard(
        &self,
        contract: &Contract,
        key: ShardKey,
        data: Bytes,
    ) -> Result<(), HostError>;

    /// Download one shard
    async fn fetch_shard(&self, host: HostId, key: ShardKey) -> Result<Bytes, HostError>;

    /// Give up a contract, letting the host drop the shard
    async fn release_contract(&self, contract: &Contract) -> Result<(), HostError>;
}
