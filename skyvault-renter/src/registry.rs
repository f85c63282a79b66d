//! Host registry
//!
//! Wraps a [`HostNetworkClient`] with the renter's selection policy and puts
//! a timeout on every host call. A timeout is reported as
//! [`HostError::Timeout`] like any other per-host failure.

use crate::client::{HostError, HostNetworkClient};
use crate::config::RenterConfig;
use crate::error::{RenterError, Result};
use crate::host::{Contract, ContractRequest, Host};
use bytes::Bytes;
use skyvault_core::{HostId, ShardKey};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;
use tracing::{debug, warn};
use uuid::Uuid;

/// Selects hosts and forwards host operations
pub struct HostRegistry {
    client: Arc<dyn HostNetworkClient>,
    config: RenterConfig,
    renter_id: Uuid,
}

impl HostRegistry {
    pub fn new(client: Arc<dyn HostNetworkClient>, config: RenterConfig, renter_id: Uuid) -> Self {
        Self {
            client,
            config,
            renter_id,
        }
    }

    pub fn renter_id(&self) -> Uuid {
        self.renter_id
    }

    pub fn config(&self) -> &RenterConfig {
        &self.config
    }

    /// Hosts that accept our terms, cheapest first
    pub async fn contractable_hosts(&self) -> Result<Vec<Host>> {
        let all = bounded(self.config.host_timeout(), self.client.contractable_hosts())
            .await
            .map_err(|e| RenterError::HostNetwork(e.to_string()))?;
        let offered = all.len();

        let mut hosts: Vec<Host> = all
            .into_iter()
            .filter(|h| h.terms.price_per_byte_block <= self.config.max_price_per_byte)
            .filter(|h| h.terms.max_duration >= self.config.contract_duration)
            .collect();
        hosts.sort_by(|a, b| {
            a.terms
                .price_per_byte_block
                .cmp(&b.terms.price_per_byte_block)
                .then_with(|| a.id.cmp(&b.id))
        });

        debug!(
            offered,
            acceptable = hosts.len(),
            "Queried contractable hosts"
        );
        Ok(hosts)
    }

    /// Form a contract for one shard of `file_id` on `host`
    pub async fn form_contract(
        &self,
        host: &Host,
        file_id: Uuid,
        shard_index: usize,
        shard_size: u64,
    ) -> std::result::Result<Contract, HostError> {
        let duration = self.config.contract_duration;
        let request = ContractRequest {
            renter_id: self.renter_id,
            file_id,
            shard_index,
            shard_size,
            duration,
            payment: host.terms.payment_for(shard_size, duration),
        };
        bounded(
            self.config.host_timeout(),
            self.client.form_contract(host, request),
        )
        .await
    }

    /// Store a shard under `contract`
    pub async fn store_shard(
        &self,
        contract: &Contract,
        key: ShardKey,
        data: Bytes,
    ) -> std::result::Result<(), HostError> {
        bounded(
            self.config.host_timeout(),
            self.client.store_shard(contract, key, data),
        )
        .await
    }

    /// Fetch a shard from `host`
    pub async fn fetch_shard(
        &self,
        host: HostId,
        key: ShardKey,
    ) -> std::result::Result<Bytes, HostError> {
        bounded(
            self.config.fetch_timeout(),
            self.client.fetch_shard(host, key),
        )
        .await
    }

    /// Release `contract`; failures are logged and otherwise ignored
    pub async fn release_contract(&self, contract: &Contract) -> bool {
        match bounded(
            self.config.host_timeout(),
            self.client.release_contract(contract),
        )
        .await
        {
            Ok(()) => true,
            Err(e) => {
                warn!(
                    contract_id = %contract.id,
                    host_id = %contract.host_id,
                    error = %e,
                    "Failed to release contract"
                );
                false
            }
        }
    }
}

async fn bounded<T, F>(limit: Duration, fut: F) -> std::result::Result<T, HostError>
where
    F: Future<Output = std::result::Result<T, HostError>>,
{
    match timeout(limit, fut).await {
        Ok(result) => result,
        Err(_) => Err(HostError::Timeout),
    }
}
