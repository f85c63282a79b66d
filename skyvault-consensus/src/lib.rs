//! SkyVault Consensus Library
//!
//! Node-local proof-of-work logic:
//! - Block headers with a fixed serialization and explicit nonce slot
//! - Target-based nonce search with a bounded attempt budget
//! - `MinerEngine`: fetch work, solve, submit, retry on stale tips
//! - Coin maturity: mined outputs only become spendable after a delay
//!
//! The chain itself is reached through the [`ConsensusClient`] capability.

pub mod client;
pub mod error;
pub mod maturity;
pub mod miner;
pub mod types;

pub use client::{ConsensusClient, PrimarySeed};
pub use error::{ChainError, MiningError};
pub use maturity::{
    is_spendable, ConsensusParams, MaturityTracker, MinedOutput, OutputLedger,
    DEFAULT_MATURITY_DELAY,
};
pub use miner::{solve_header, MinedBlock, MinerConfig, MinerEngine, SolveOutcome, SubmitOutcome};
pub use types::{block_subsidy, BlockHeader, BlockHeight, BlockId, HeaderBuffer, Target};
