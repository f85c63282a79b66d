//! Error types for the consensus collaborator and the mining engine

use crate::types::BlockHeight;
use thiserror::Error;

/// Errors reported by the chain collaborator
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ChainError {
    #[error("Stale header: chain is already at height {height}")]
    Stale { height: BlockHeight },

    #[error("Header rejected: {0}")]
    Rejected(String),

    #[error("Wallet is locked")]
    WalletLocked,

    #[error("Wallet error: {0}")]
    Wallet(String),

    #[error("Chain unreachable: {0}")]
    Unreachable(String),
}

impl ChainError {
    /// Whether another block already extended the tip this work was built on
    pub fn is_stale(&self) -> bool {
        matches!(self, ChainError::Stale { .. })
    }
}

/// Errors surfaced by the mining engine
///
/// Stale work and exhausted nonce ranges are retried internally and never
/// appear here.
#[derive(Error, Debug)]
pub enum MiningError {
    #[error("Failed to get header for work: {0}")]
    Work(ChainError),

    #[error("Failed to submit header: {0}")]
    Submit(ChainError),

    #[error("Mining task failed: {0}")]
    Task(String),

    #[error("Mining cancelled")]
    Cancelled,
}

impl MiningError {
    /// The chain collaborator error behind this failure, if any
    pub fn chain_error(&self) -> Option<&ChainError> {
        match self {
            MiningError::Work(e) | MiningError::Submit(e) => Some(e),
            _ => None,
        }
    }
}
