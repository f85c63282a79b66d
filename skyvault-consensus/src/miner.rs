//! Proof-of-work mining engine
//!
//! A mining attempt is fetch work, search a bounded nonce range, submit.
//! Exhausted ranges and stale submissions are normal outcomes that send the
//! engine back for fresh work; only collaborator failures reach the caller.

use crate::client::ConsensusClient;
use crate::error::MiningError;
use crate::maturity::{MinedOutput, OutputLedger};
use crate::types::{block_subsidy, BlockHeader, BlockHeight, BlockId, HeaderBuffer, Target};
use metrics::counter;
use serde::{Deserialize, Serialize};
use skyvault_core::metric_names as names;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

/// Result of a bounded nonce search
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SolveOutcome {
    /// Header carrying the winning nonce
    Solved(BlockHeader),
    /// Budget exhausted without a valid nonce
    NoSolutionInRange { attempts: u64 },
}

/// Result of submitting a solved header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitOutcome {
    Accepted(BlockHeight),
    /// The tip moved on before the header arrived
    Stale,
}

/// Search up to `budget` nonces starting at `header.nonce`.
///
/// Each candidate is written into the serialized header before it is hashed,
/// so a solved header always hashes under `target` with exactly the nonce it
/// carries. Nonces wrap at `u64::MAX`.
pub fn solve_header(target: &Target, header: &BlockHeader, budget: u64) -> SolveOutcome {
    let mut buffer = HeaderBuffer::new(header);
    let mut nonce = header.nonce;

    for _ in 0..budget {
        buffer.set_nonce(nonce);
        if target.meets(&buffer.hash()) {
            return SolveOutcome::Solved(buffer.to_header());
        }
        nonce = nonce.wrapping_add(1);
    }

    SolveOutcome::NoSolutionInRange { attempts: budget }
}

/// Mining engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MinerConfig {
    /// Nonces tried per batch before fresh work is fetched
    pub attempts_per_batch: u64,
    /// Pause after a collaborator failure in the background loop
    pub retry_backoff_ms: u64,
}

impl Default for MinerConfig {
    fn default() -> Self {
        Self {
            attempts_per_batch: 16_000,
            retry_backoff_ms: 500,
        }
    }
}

impl MinerConfig {
    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }
}

/// A block this engine got accepted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MinedBlock {
    pub id: BlockId,
    pub height: BlockHeight,
    pub header: BlockHeader,
    pub reward: u64,
}

/// Drives fetch, solve and submit against a chain collaborator
pub struct MinerEngine {
    client: Arc<dyn ConsensusClient>,
    config: MinerConfig,
    ledger: Arc<OutputLedger>,
    /// Next unclaimed nonce; every batch gets a disjoint range
    nonce_cursor: AtomicU64,
}

impl MinerEngine {
    pub fn new(
        client: Arc<dyn ConsensusClient>,
        config: MinerConfig,
        ledger: Arc<OutputLedger>,
    ) -> Self {
        Self {
            client,
            config,
            ledger,
            nonce_cursor: AtomicU64::new(0),
        }
    }

    pub fn config(&self) -> &MinerConfig {
        &self.config
    }

    pub fn ledger(&self) -> &Arc<OutputLedger> {
        &self.ledger
    }

    /// Fetch a fresh job for the current tip
    pub async fn get_work(&self) -> Result<(Target, BlockHeader), MiningError> {
        self.client.get_miner_header().await.map_err(MiningError::Work)
    }

    /// Search one batch off the async runtime
    pub async fn solve(
        &self,
        target: Target,
        mut header: BlockHeader,
    ) -> Result<SolveOutcome, MiningError> {
        let budget = self.config.attempts_per_batch;
        header.nonce = self.nonce_cursor.fetch_add(budget, Ordering::Relaxed);

        tokio::task::spawn_blocking(move || solve_header(&target, &header, budget))
            .await
            .map_err(|e| MiningError::Task(e.to_string()))
    }

    /// Submit a solved header; stale tips are reported, not raised
    pub async fn submit_header(&self, header: BlockHeader) -> Result<SubmitOutcome, MiningError> {
        match self.client.post_miner_header(header).await {
            Ok(height) => Ok(SubmitOutcome::Accepted(height)),
            Err(e) if e.is_stale() => Ok(SubmitOutcome::Stale),
            Err(e) => Err(MiningError::Submit(e)),
        }
    }

    /// Fetch, solve and submit until one block is accepted
    pub async fn mine_one_block(&self) -> Result<MinedBlock, MiningError> {
        self.mine_one_block_until(&CancellationToken::new()).await
    }

    /// [`mine_one_block`](Self::mine_one_block) that gives up with
    /// [`MiningError::Cancelled`] once `cancel` fires.
    ///
    /// Cancellation is observed while fetching work and while solving. A
    /// solved header is always submitted and, when accepted, recorded in the
    /// ledger before this returns.
    #[instrument(skip(self, cancel))]
    pub async fn mine_one_block_until(
        &self,
        cancel: &CancellationToken,
    ) -> Result<MinedBlock, MiningError> {
        loop {
            let (target, header) = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(MiningError::Cancelled),
                work = self.get_work() => work?,
            };

            let outcome = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(MiningError::Cancelled),
                outcome = self.solve(target, header) => outcome?,
            };
            let solved = match outcome {
                SolveOutcome::Solved(solved) => solved,
                SolveOutcome::NoSolutionInRange { attempts } => {
                    counter!(names::NONCE_BATCHES_EXHAUSTED).increment(1);
                    debug!(attempts, "Nonce batch exhausted, fetching fresh work");
                    continue;
                }
            };

            match self.submit_header(solved).await? {
                SubmitOutcome::Accepted(height) => {
                    let block = MinedBlock {
                        id: solved.id(),
                        height,
                        header: solved,
                        reward: block_subsidy(height),
                    };
                    self.ledger.record(MinedOutput {
                        block_id: block.id,
                        mint_height: height,
                        value: block.reward,
                    });
                    counter!(names::BLOCKS_MINED).increment(1);
                    info!(height, block_id = %block.id, reward = block.reward, "Block accepted");
                    return Ok(block);
                }
                SubmitOutcome::Stale => {
                    counter!(names::STALE_SUBMISSIONS).increment(1);
                    warn!(parent = %solved.parent_id, "Submitted header was stale, retrying");
                }
            }
        }
    }

    /// Mine `count` blocks in sequence
    pub async fn mine_blocks(&self, count: u64) -> Result<Vec<MinedBlock>, MiningError> {
        let mut blocks = Vec::with_capacity(count as usize);
        for _ in 0..count {
            blocks.push(self.mine_one_block().await?);
        }
        Ok(blocks)
    }

    /// Long-lived mining loop; returns once `cancel` fires and any in-flight
    /// submission has been recorded
    pub async fn run(self: Arc<Self>, cancel: CancellationToken) {
        info!(
            attempts_per_batch = self.config.attempts_per_batch,
            "Miner started"
        );

        loop {
            match self.mine_one_block_until(&cancel).await {
                Ok(_) => {}
                Err(MiningError::Cancelled) => break,
                Err(e) => {
                    counter!(names::MINING_ERRORS).increment(1);
                    warn!(error = %e, "Mining attempt failed, backing off");
                    tokio::select! {
                        _ = cancel.cancelled() => break,
                        _ = tokio::time::sleep(self.config.retry_backoff()) => {}
                    }
                }
            }
        }

        info!(blocks = self.ledger.len(), "Miner stopped");
    }

    /// Start [`run`](Self::run) on the runtime
    pub fn spawn(self: Arc<Self>, cancel: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(self.run(cancel))
    }
}

impl std::fmt::Debug for MinerEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MinerEngine")
            .field("config", &self.config)
            .field("mined", &self.ledger.len())
            .finish()
    }
}
