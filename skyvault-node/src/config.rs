//! Configuration management for SkyVault nodes
//!
//! Supports loading from TOML files, CLI overrides and environment variables.

use serde::{Deserialize, Serialize};
use skyvault_consensus::{ConsensusParams, MinerConfig, PrimarySeed, Target, DEFAULT_MATURITY_DELAY};
use skyvault_renter::{ContractTerms, RenterConfig};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse config file: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

/// Complete node configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NodeConfig {
    #[serde(default)]
    pub node: NodeSettings,

    #[serde(default)]
    pub consensus: ConsensusSettings,

    #[serde(default)]
    pub mining: MiningSettings,

    #[serde(default)]
    pub wallet: WalletSettings,

    /// Upload/download behavior
    #[serde(default)]
    pub renter: RenterConfig,

    /// Local chain and host pool used by the devnet daemon
    #[serde(default)]
    pub devnet: DevnetSettings,

    #[serde(default)]
    pub metrics: MetricsSettings,
}

impl NodeConfig {
    /// Load configuration from a TOML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: NodeConfig = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration with fallback to defaults
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        match Self::from_file(path) {
            Ok(config) => config,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to load config, using defaults");
                Self::default()
            }
        }
    }

    /// Small maturity delay, easy target and short host timeouts
    pub fn for_testing() -> Self {
        Self {
            consensus: ConsensusSettings { maturity_delay: 3 },
            mining: MiningSettings {
                attempts_per_batch: 1_000,
                ..Default::default()
            },
            renter: RenterConfig::for_testing(),
            devnet: DevnetSettings {
                target_bits: 4,
                ..Default::default()
            },
            ..Default::default()
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.metrics.enabled && self.metrics.port == 0 {
            return Err(ConfigError::ValidationError(
                "metrics.port cannot be 0 when metrics are enabled".to_string(),
            ));
        }
        if self.node.data_dir.as_os_str().is_empty() {
            return Err(ConfigError::ValidationError(
                "node.data_dir cannot be empty".to_string(),
            ));
        }
        if self.mining.attempts_per_batch == 0 {
            return Err(ConfigError::ValidationError(
                "mining.attempts_per_batch must be greater than 0".to_string(),
            ));
        }
        if self.devnet.target_bits > 32 {
            return Err(ConfigError::ValidationError(format!(
                "devnet.target_bits {} would never be mined locally",
                self.devnet.target_bits
            )));
        }
        self.renter
            .validate()
            .map_err(|e| ConfigError::ValidationError(e.to_string()))?;
        Ok(())
    }

    /// Override config with CLI arguments
    pub fn with_overrides(mut self, data_dir: Option<PathBuf>, metrics_port: Option<u16>) -> Self {
        if let Some(dir) = data_dir {
            self.node.data_dir = dir;
        }
        if let Some(port) = metrics_port {
            self.metrics.port = port;
        }
        self
    }

    /// Apply `SKYVAULT_*` environment variable overrides
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(dir) = std::env::var("SKYVAULT_DATA_DIR") {
            self.node.data_dir = PathBuf::from(dir);
        }
        if let Some(port) = env_parse("SKYVAULT_METRICS_PORT") {
            self.metrics.port = port;
        }
        if let Some(delay) = env_parse("SKYVAULT_MATURITY_DELAY") {
            self.consensus.maturity_delay = delay;
        }
        if let Ok(seed) = std::env::var("SKYVAULT_WALLET_SEED") {
            self.wallet.seed = Some(seed);
        }
        if let Ok(name) = std::env::var("SKYVAULT_NODE_NAME") {
            self.node.name = name;
        }
        self
    }

    pub fn consensus_params(&self) -> ConsensusParams {
        ConsensusParams {
            maturity_delay: self.consensus.maturity_delay,
        }
    }

    pub fn miner_config(&self) -> MinerConfig {
        MinerConfig {
            attempts_per_batch: self.mining.attempts_per_batch,
            retry_backoff_ms: self.mining.retry_backoff_ms,
        }
    }

    pub fn wallet_seed(&self) -> Option<PrimarySeed> {
        self.wallet.seed.as_deref().map(PrimarySeed::new)
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.parse().ok())
}

/// Node identity
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeSettings {
    pub name: String,
    /// Where node downloads land when no destination is given
    pub data_dir: PathBuf,
    /// Seconds between status log lines in the daemon
    pub status_interval_secs: u64,
}

impl Default for NodeSettings {
    fn default() -> Self {
        Self {
            name: "skyvault".to_string(),
            data_dir: PathBuf::from("./data"),
            status_interval_secs: 30,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConsensusSettings {
    /// Confirmations before mined coins can be spent
    pub maturity_delay: u64,
}

impl Default for ConsensusSettings {
    fn default() -> Self {
        Self {
            maturity_delay: DEFAULT_MATURITY_DELAY,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MiningSettings {
    pub attempts_per_batch: u64,
    pub retry_backoff_ms: u64,
}

impl Default for MiningSettings {
    fn default() -> Self {
        let defaults = MinerConfig::default();
        Self {
            attempts_per_batch: defaults.attempts_per_batch,
            retry_backoff_ms: defaults.retry_backoff_ms,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct WalletSettings {
    /// Existing primary seed; a new one is generated when unset
    pub seed: Option<String>,
    /// Generate seeds as dictionary words
    pub use_dictionary: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DevnetSettings {
    pub hosts: usize,
    pub renters: usize,
    pub miners: usize,
    /// Leading zero bits required of block IDs
    pub target_bits: u32,
    pub host_price_per_byte_block: u64,
    pub host_max_duration: u64,
}

impl Default for DevnetSettings {
    fn default() -> Self {
        Self {
            hosts: 5,
            renters: 1,
            miners: 1,
            target_bits: 12,
            host_price_per_byte_block: 1,
            host_max_duration: 100_000,
        }
    }
}

impl DevnetSettings {
    pub fn target(&self) -> Target {
        Target::from_leading_zero_bits(self.target_bits)
    }

    pub fn host_terms(&self) -> ContractTerms {
        ContractTerms {
            price_per_byte_block: self.host_price_per_byte_block,
            max_duration: self.host_max_duration,
        }
    }
}

/// Prometheus exporter settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsSettings {
    pub enabled: bool,
    pub port: u16,
}

impl Default for MetricsSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            port: 9983,
        }
    }
}
