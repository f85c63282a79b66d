//! SkyVault Node Library
//!
//! Binds the consensus and renter crates into one network participant:
//! - Configuration management
//! - `Node`: wallet setup, self-funding by mining, renter access
//! - `NodeGroup`: a local chain plus in-memory hosts and funded nodes
//! - Prometheus metric descriptions and exporter

pub mod config;
pub mod group;
pub mod metrics;
pub mod node;

pub use config::{
    ConfigError, ConsensusSettings, DevnetSettings, MetricsSettings, MiningSettings,
    NodeConfig, NodeSettings, WalletSettings,
};
pub use group::{GroupParams, NodeGroup};
pub use metrics::{init_metrics, install_exporter};
pub use node::{Node, NodeError, NodeParams};
