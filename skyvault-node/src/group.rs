//! A self-contained network of nodes
//!
//! Every node in a group shares one [`LocalChain`] and renters share one
//! [`MemoryHostNetwork`]. Nodes are created one after another so each
//! funds itself on top of the blocks mined by the ones before it.

use crate::config::NodeConfig;
use crate::node::{Node, NodeError, NodeParams};
use bytes::Bytes;
use skyvault_consensus::MinedBlock;
use skyvault_core::FileManifest;
use skyvault_renter::HostNetworkClient;
use skyvault_testkit::{random_bytes, LocalChain, MemoryHostNetwork};
use std::sync::Arc;
use tracing::info;

/// Group shape
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GroupParams {
    pub hosts: usize,
    pub renters: usize,
    pub miners: usize,
}

impl From<&crate::config::DevnetSettings> for GroupParams {
    fn from(devnet: &crate::config::DevnetSettings) -> Self {
        Self {
            hosts: devnet.hosts,
            renters: devnet.renters,
            miners: devnet.miners,
        }
    }
}

pub struct NodeGroup {
    chain: Arc<LocalChain>,
    network: Arc<MemoryHostNetwork>,
    renters: Vec<Node>,
    miners: Vec<Node>,
}

impl NodeGroup {
    pub async fn new(params: GroupParams, config: &NodeConfig) -> Result<Self, NodeError> {
        let chain = LocalChain::new(config.devnet.target());
        let network = MemoryHostNetwork::with_hosts(params.hosts, config.devnet.host_terms());
        let hosts: Arc<dyn HostNetworkClient> = network.clone();

        let mut renters = Vec::with_capacity(params.renters);
        for i in 0..params.renters {
            let params = NodeParams::from_config(
                config,
                Arc::new(chain.connect()),
                Some(hosts.clone()),
            )
            .with_name(format!("{}-renter-{i}", config.node.name));
            renters.push(Node::new(params).await?);
        }

        let mut miners = Vec::with_capacity(params.miners);
        for i in 0..params.miners {
            let params = NodeParams::from_config(config, Arc::new(chain.connect()), None)
                .with_name(format!("{}-miner-{i}", config.node.name));
            miners.push(Node::new(params).await?);
        }

        info!(
            hosts = params.hosts,
            renters = renters.len(),
            miners = miners.len(),
            height = chain.height(),
            "Node group ready"
        );

        Ok(Self {
            chain,
            network,
            renters,
            miners,
        })
    }

    pub fn chain(&self) -> &Arc<LocalChain> {
        &self.chain
    }

    pub fn host_network(&self) -> &Arc<MemoryHostNetwork> {
        &self.network
    }

    pub fn renters(&self) -> &[Node] {
        &self.renters
    }

    pub fn miners(&self) -> &[Node] {
        &self.miners
    }

    /// Every node, renters first
    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.renters.iter().chain(self.miners.iter())
    }

    /// Upload `size` random bytes from `renter` and wait for every placement
    pub async fn upload_new_file_blocking(
        &self,
        renter: &Node,
        size: usize,
        data_pieces: usize,
        parity_pieces: usize,
    ) -> Result<(Bytes, FileManifest), NodeError> {
        let data = random_bytes(size);
        let manifest = renter
            .renter()?
            .upload_file_blocking(data.clone(), data_pieces, parity_pieces)
            .await?;
        Ok((data, manifest))
    }

    /// Mine `count` blocks with the first miner, or the first node if none
    pub async fn mine_blocks(&self, count: u64) -> Result<Vec<MinedBlock>, NodeError> {
        let node = self
            .miners
            .first()
            .or_else(|| self.renters.first())
            .ok_or(NodeError::NoMiner)?;
        Ok(node.miner().mine_blocks(count).await?)
    }
}
