//! In-process proof-of-work chain
//!
//! One [`LocalChain`] holds the tip shared by every node of a test group.
//! Each node talks to it through its own [`LocalChainClient`], which carries
//! that node's wallet.

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use skyvault_consensus::{
    BlockHeader, BlockHeight, BlockId, ChainError, ConsensusClient, PrimarySeed, Target,
};
use skyvault_core::ContentHash;
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

const SEED_WORDS: &[&str] = &[
    "abbey", "amidst", "bakery", "beyond", "cabin", "cider", "dapper", "dozen", "eagle", "elope",
    "fabric", "fossil", "gables", "gusts", "habitat", "hoisting", "icon", "inmate", "jaded",
    "jolted", "kennel", "kiwi", "lair", "lush", "macro", "muzzle", "nabbing", "nudged", "oasis",
    "onward", "pact", "pivot",
];

struct ChainState {
    height: BlockHeight,
    tip: BlockId,
    target: Target,
    work_issued: u64,
    unreachable: bool,
}

/// Shared chain state
pub struct LocalChain {
    state: Mutex<ChainState>,
}

impl LocalChain {
    /// Chain at genesis with the given proof-of-work target
    pub fn new(target: Target) -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(ChainState {
                height: 0,
                tip: BlockId::default(),
                target,
                work_issued: 0,
                unreachable: false,
            }),
        })
    }

    /// Client with its own, uninitialized wallet
    pub fn connect(self: &Arc<Self>) -> LocalChainClient {
        LocalChainClient {
            chain: self.clone(),
            wallet: Mutex::new(Wallet::default()),
        }
    }

    pub fn height(&self) -> BlockHeight {
        self.state.lock().height
    }

    pub fn tip(&self) -> BlockId {
        self.state.lock().tip
    }

    pub fn set_target(&self, target: Target) {
        self.state.lock().target = target;
    }

    /// Make every call fail with `ChainError::Unreachable`
    pub fn set_unreachable(&self, unreachable: bool) {
        self.state.lock().unreachable = unreachable;
    }

    /// Extend the chain as if another miner found a block
    pub fn advance_tip(&self) -> BlockHeight {
        let mut state = self.state.lock();
        state.height += 1;
        state.tip = BlockId::from_bytes(*ContentHash::compute(&state.height.to_le_bytes()).as_bytes());
        debug!(height = state.height, "Tip advanced externally");
        state.height
    }

    fn check_reachable(state: &ChainState) -> Result<(), ChainError> {
        if state.unreachable {
            return Err(ChainError::Unreachable("local chain offline".into()));
        }
        Ok(())
    }
}

#[derive(Default)]
struct Wallet {
    seed: Option<PrimarySeed>,
    unlocked: bool,
}

/// One node's connection to a [`LocalChain`]
pub struct LocalChainClient {
    chain: Arc<LocalChain>,
    wallet: Mutex<Wallet>,
}

impl LocalChainClient {
    pub fn chain(&self) -> &Arc<LocalChain> {
        &self.chain
    }

    pub fn is_unlocked(&self) -> bool {
        self.wallet.lock().unlocked
    }
}

fn generate_seed(use_dictionary: bool) -> PrimarySeed {
    let entropy = Uuid::new_v4();
    if use_dictionary {
        let words: Vec<&str> = entropy
            .as_bytes()
            .iter()
            .take(12)
            .map(|b| SEED_WORDS[*b as usize % SEED_WORDS.len()])
            .collect();
        PrimarySeed::new(words.join(" "))
    } else {
        PrimarySeed::new(entropy.simple().to_string())
    }
}

#[async_trait]
impl ConsensusClient for LocalChainClient {
    async fn get_miner_header(&self) -> Result<(Target, BlockHeader), ChainError> {
        if !self.wallet.lock().unlocked {
            return Err(ChainError::WalletLocked);
        }

        let mut state = self.chain.state.lock();
        LocalChain::check_reachable(&state)?;
        state.work_issued += 1;

        let header = BlockHeader {
            parent_id: state.tip,
            nonce: 0,
            timestamp: Utc::now().timestamp().max(0) as u64,
            merkle_root: *ContentHash::compute(&state.work_issued.to_le_bytes()).as_bytes(),
        };
        Ok((state.target, header))
    }

    async fn post_miner_header(&self, header: BlockHeader) -> Result<BlockHeight, ChainError> {
        let mut state = self.chain.state.lock();
        LocalChain::check_reachable(&state)?;

        if header.parent_id != state.tip {
            return Err(ChainError::Stale {
                height: state.height,
            });
        }
        let id = header.id();
        if !state.target.meets(id.as_bytes()) {
            return Err(ChainError::Rejected("header does not meet target".into()));
        }

        state.height += 1;
        state.tip = id;
        Ok(state.height)
    }

    async fn post_wallet_init(
        &self,
        seed: Option<PrimarySeed>,
        use_dictionary: bool,
    ) -> Result<PrimarySeed, ChainError> {
        LocalChain::check_reachable(&self.chain.state.lock())?;

        let mut wallet = self.wallet.lock();
        if wallet.seed.is_some() {
            return Err(ChainError::Wallet("wallet already initialized".into()));
        }
        let seed = seed.unwrap_or_else(|| generate_seed(use_dictionary));
        wallet.seed = Some(seed.clone());
        Ok(seed)
    }

    async fn post_wallet_unlock(&self, seed: &PrimarySeed) -> Result<(), ChainError> {
        LocalChain::check_reachable(&self.chain.state.lock())?;

        let mut wallet = self.wallet.lock();
        match &wallet.seed {
            None => Err(ChainError::Wallet("wallet not initialized".into())),
            Some(stored) if stored != seed => Err(ChainError::Wallet("incorrect seed".into())),
            Some(_) => {
                wallet.unlocked = true;
                Ok(())
            }
        }
    }

    async fn block_height(&self) -> Result<BlockHeight, ChainError> {
        let state = self.chain.state.lock();
        LocalChain::check_reachable(&state)?;
        Ok(state.height)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn unlocked_client(chain: &Arc<LocalChain>) -> LocalChainClient {
        let client = chain.connect();
        let seed = client.post_wallet_init(None, true).await.unwrap();
        client.post_wallet_unlock(&seed).await.unwrap();
        client
    }

    #[tokio::test]
    async fn test_wallet_must_be_unlocked_for_work() {
        let chain = LocalChain::new(Target::MAX);
        let client = chain.connect();
        assert_eq!(
            client.get_miner_header().await.unwrap_err(),
            ChainError::WalletLocked
        );

        let seed = client.post_wallet_init(None, false).await.unwrap();
        assert!(client
            .post_wallet_unlock(&PrimarySeed::new("wrong"))
            .await
            .is_err());
        client.post_wallet_unlock(&seed).await.unwrap();
        assert!(client.get_miner_header().await.is_ok());
    }

    #[tokio::test]
    async fn test_dictionary_seed_has_twelve_words() {
        let chain = LocalChain::new(Target::MAX);
        let client = chain.connect();
        let seed = client.post_wallet_init(None, true).await.unwrap();
        assert_eq!(seed.as_str().split(' ').count(), 12);
        assert!(client.post_wallet_init(None, true).await.is_err());
    }

    #[tokio::test]
    async fn test_successive_work_differs() {
        let chain = LocalChain::new(Target::MAX);
        let client = unlocked_client(&chain).await;
        let (_, a) = client.get_miner_header().await.unwrap();
        let (_, b) = client.get_miner_header().await.unwrap();
        assert_eq!(a.parent_id, b.parent_id);
        assert_ne!(a.merkle_root, b.merkle_root);
    }

    #[tokio::test]
    async fn test_submission_after_external_block_is_stale() {
        let chain = LocalChain::new(Target::MAX);
        let client = unlocked_client(&chain).await;
        let (_, header) = client.get_miner_header().await.unwrap();

        chain.advance_tip();
        assert_eq!(
            client.post_miner_header(header).await.unwrap_err(),
            ChainError::Stale { height: 1 }
        );
    }

    #[tokio::test]
    async fn test_insufficient_work_is_rejected() {
        let chain = LocalChain::new(Target::ZERO);
        let client = unlocked_client(&chain).await;
        let (_, header) = client.get_miner_header().await.unwrap();
        assert!(matches!(
            client.post_miner_header(header).await,
            Err(ChainError::Rejected(_))
        ));
        assert_eq!(chain.height(), 0);
    }

    #[tokio::test]
    async fn test_unreachable() {
        let chain = LocalChain::new(Target::MAX);
        let client = chain.connect();
        chain.set_unreachable(true);
        assert!(matches!(
            client.block_height().await,
            Err(ChainError::Unreachable(_))
        ));
    }
}
