//! Chain collaborator capability
//!
//! The transport used to reach the chain is out of scope for this crate;
//! nodes receive an implementation of [`ConsensusClient`] at construction.

use crate::error::ChainError;
use crate::types::{BlockHeader, BlockHeight, Target};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Wallet primary seed as returned by wallet initialization
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrimarySeed(String);

impl PrimarySeed {
    pub fn new(seed: impl Into<String>) -> Self {
        Self(seed.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

// Never print seeds into logs
impl fmt::Debug for PrimarySeed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PrimarySeed(<redacted>)")
    }
}

/// Operations the node consumes from the chain
#[async_trait]
pub trait ConsensusClient: Send + Sync {
    /// Fresh mining work for the current tip
    async fn get_miner_header(&self) -> Result<(Target, BlockHeader), ChainError>;

    /// Submit a solved header; returns the height of the accepted block
    async fn post_miner_header(&self, header: BlockHeader) -> Result<BlockHeight, ChainError>;

    /// Initialize the wallet, generating a seed when none is given
    async fn post_wallet_init(
        &self,
        seed: Option<PrimarySeed>,
        use_dictionary: bool,
    ) -> Result<PrimarySeed, ChainError>;

    /// Unlock the wallet with its primary seed
    async fn post_wallet_unlock(&self, seed: &PrimarySeed) -> Result<(), ChainError>;

    /// Current chain height
    async fn block_height(&self) -> Result<BlockHeight, ChainError>;
}
