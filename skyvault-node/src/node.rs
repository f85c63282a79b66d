//! One network participant
//!
//! A node owns a mining engine and, when it has a host network, a renter.
//! Construction initializes and unlocks the wallet and then mines enough
//! blocks for the first reward to mature, so every node starts funded.

use crate::config::{ConfigError, NodeConfig};
use skyvault_consensus::{
    BlockHeight, ChainError, ConsensusClient, ConsensusParams, MinedBlock, MinerConfig,
    MinerEngine, MiningError, OutputLedger, PrimarySeed,
};
use skyvault_core::FileManifest;
use skyvault_renter::{
    DownloadHandle, DownloadMode, HostNetworkClient, Renter, RenterConfig, RenterError,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument};

/// Node errors
#[derive(Error, Debug)]
pub enum NodeError {
    #[error("Can't create funded node without miner")]
    NoMiner,

    #[error("Node has no renter")]
    NoRenter,

    #[error("Renter requires a host network")]
    NoHostNetwork,

    #[error("Chain error: {0}")]
    Chain(#[from] ChainError),

    #[error(transparent)]
    Mining(#[from] MiningError),

    #[error(transparent)]
    Renter(#[from] RenterError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// What a node is built from
pub struct NodeParams {
    pub name: String,
    pub chain: Arc<dyn ConsensusClient>,
    /// Host network for the renter; `None` for miner-only nodes
    pub hosts: Option<Arc<dyn HostNetworkClient>>,
    pub miner: Option<MinerConfig>,
    pub renter: Option<RenterConfig>,
    pub consensus: ConsensusParams,
    /// Reuse an existing wallet seed instead of generating one
    pub wallet_seed: Option<PrimarySeed>,
    pub use_dictionary: bool,
    /// Root for downloads without an explicit destination
    pub data_dir: PathBuf,
}

impl NodeParams {
    /// Miner plus renter when `hosts` is given, miner only otherwise
    pub fn from_config(
        config: &NodeConfig,
        chain: Arc<dyn ConsensusClient>,
        hosts: Option<Arc<dyn HostNetworkClient>>,
    ) -> Self {
        let renter = hosts.as_ref().map(|_| config.renter.clone());
        Self {
            name: config.node.name.clone(),
            chain,
            hosts,
            miner: Some(config.miner_config()),
            renter,
            consensus: config.consensus_params(),
            wallet_seed: config.wallet_seed(),
            use_dictionary: config.wallet.use_dictionary,
            data_dir: config.node.data_dir.clone(),
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }
}

/// A funded network participant
pub struct Node {
    name: String,
    chain: Arc<dyn ConsensusClient>,
    miner: Arc<MinerEngine>,
    renter: Option<Renter>,
    seed: PrimarySeed,
    data_dir: PathBuf,
}

impl Node {
    /// Build, unlock and fund a node
    #[instrument(skip(params), fields(name = %params.name))]
    pub async fn new(params: NodeParams) -> Result<Self, NodeError> {
        let miner_config = params.miner.ok_or(NodeError::NoMiner)?;

        let renter = match (params.renter, params.hosts) {
            (Some(config), Some(hosts)) => Some(Renter::new(hosts, config)?),
            (Some(_), None) => return Err(NodeError::NoHostNetwork),
            (None, _) => None,
        };

        let seed = params
            .chain
            .post_wallet_init(params.wallet_seed, params.use_dictionary)
            .await?;
        params.chain.post_wallet_unlock(&seed).await?;
        debug!("Wallet unlocked");

        let ledger = Arc::new(OutputLedger::new(params.consensus));
        let miner = Arc::new(MinerEngine::new(
            params.chain.clone(),
            miner_config,
            ledger,
        ));

        let node = Self {
            name: params.name,
            chain: params.chain,
            miner,
            renter,
            seed,
            data_dir: params.data_dir,
        };
        node.fund(params.consensus.maturity_delay).await?;
        Ok(node)
    }

    /// Mine until the first reward of this node is spendable
    async fn fund(&self, maturity_delay: BlockHeight) -> Result<(), NodeError> {
        let blocks = self.miner.mine_blocks(maturity_delay + 1).await?;
        let height = blocks.last().map(|b| b.height).unwrap_or_default();
        info!(
            node = %self.name,
            blocks = blocks.len(),
            height,
            "Node funded"
        );
        Ok(())
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn seed(&self) -> &PrimarySeed {
        &self.seed
    }

    pub fn miner(&self) -> &Arc<MinerEngine> {
        &self.miner
    }

    pub fn renter(&self) -> Result<&Renter, NodeError> {
        self.renter.as_ref().ok_or(NodeError::NoRenter)
    }

    /// Directory this node downloads into: `data_dir/<name>`
    pub fn download_dir(&self) -> PathBuf {
        self.data_dir.join(&self.name)
    }

    /// Download `manifest` to `download_dir()/<file_id>`
    pub async fn download_to_data_dir(
        &self,
        manifest: &FileManifest,
        mode: DownloadMode,
    ) -> Result<DownloadHandle, NodeError> {
        let renter = self.renter()?;
        let dir = self.download_dir();
        create_dir(&dir).await?;
        let destination = dir.join(manifest.file_id.to_string());
        Ok(renter.download_to_disk(manifest, destination, mode).await?)
    }

    pub fn has_renter(&self) -> bool {
        self.renter.is_some()
    }

    /// Mine and submit a single block
    pub async fn mine_block(&self) -> Result<MinedBlock, NodeError> {
        Ok(self.miner.mine_one_block().await?)
    }

    pub async fn block_height(&self) -> Result<BlockHeight, NodeError> {
        Ok(self.chain.block_height().await?)
    }

    /// Mined value spendable at the current chain height
    pub async fn spendable_balance(&self) -> Result<u64, NodeError> {
        let height = self.block_height().await?;
        Ok(self.miner.ledger().spendable_balance(height))
    }

    /// Mined value still waiting for maturity
    pub async fn immature_balance(&self) -> Result<u64, NodeError> {
        let height = self.block_height().await?;
        Ok(self.miner.ledger().immature_balance(height))
    }

    /// Run the mining loop in the background until `cancel` fires
    pub fn spawn_miner(&self, cancel: CancellationToken) -> JoinHandle<()> {
        self.miner.clone().spawn(cancel)
    }
}

async fn create_dir(dir: &Path) -> Result<(), NodeError> {
    tokio::fs::create_dir_all(dir)
        .await
        .map_err(|e| NodeError::Renter(RenterError::from(e)))
}

impl std::fmt::Debug for Node {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Node")
            .field("name", &self.name)
            .field("renter", &self.renter.as_ref().map(|r| r.id()))
            .field("mined", &self.miner.ledger().len())
            .finish()
    }
}
