//! Renter configuration

use crate::error::{RenterError, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Renter settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RenterConfig {
    /// Contract length in blocks
    pub contract_duration: u64,

    /// Highest acceptable price per byte per block
    pub max_price_per_byte: u64,

    /// Timeout for contract formation, shard store and release (milliseconds)
    pub host_timeout_ms: u64,

    /// Timeout for a single shard fetch (milliseconds)
    pub fetch_timeout_ms: u64,

    /// Overall bound on collecting enough shards for one download (milliseconds)
    pub download_deadline_ms: u64,

    /// Finished, unobserved download jobs are kept this long (seconds)
    pub job_retention_secs: u64,
}

impl Default for RenterConfig {
    fn default() -> Self {
        Self {
            contract_duration: 4_320, // ~30 days of blocks
            max_price_per_byte: 1_000,
            host_timeout_ms: 10_000,
            fetch_timeout_ms: 30_000,
            download_deadline_ms: 120_000,
            job_retention_secs: 3_600,
        }
    }
}

impl RenterConfig {
    /// Short timeouts for in-process test networks
    pub fn for_testing() -> Self {
        Self {
            host_timeout_ms: 500,
            fetch_timeout_ms: 500,
            download_deadline_ms: 5_000,
            job_retention_secs: 60,
            ..Default::default()
        }
    }

    pub fn host_timeout(&self) -> Duration {
        Duration::from_millis(self.host_timeout_ms)
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_millis(self.fetch_timeout_ms)
    }

    pub fn download_deadline(&self) -> Duration {
        Duration::from_millis(self.download_deadline_ms)
    }

    pub fn job_retention(&self) -> Duration {
        Duration::from_secs(self.job_retention_secs)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.contract_duration == 0 {
            return Err(RenterError::InvalidParameters(
                "contract_duration must be greater than 0".into(),
            ));
        }
        if self.host_timeout_ms == 0 || self.fetch_timeout_ms == 0 {
            return Err(RenterError::InvalidParameters(
                "host timeouts must be greater than 0".into(),
            ));
        }
        if self.download_deadline_ms < self.fetch_timeout_ms {
            return Err(RenterError::InvalidParameters(format!(
                "download_deadline_ms ({}) must be at least fetch_timeout_ms ({})",
                self.download_deadline_ms, self.fetch_timeout_ms
            )));
        }
        Ok(())
    }
}
