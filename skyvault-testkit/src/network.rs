//! In-memory host network with fault injection

use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use parking_lot::{Mutex, RwLock};
use skyvault_core::{HostId, ShardKey};
use skyvault_renter::{Contract, ContractRequest, ContractTerms, Host, HostError, HostNetworkClient};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

/// Misbehavior injected into one host
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HostFault {
    #[default]
    Healthy,
    /// Refuses new contracts
    Decline,
    /// Accepts contracts but fails every shard store
    RejectStores,
    /// Never answers
    Hang,
    /// Unreachable and no longer listed as contractable
    Offline,
    /// Serves shards with a flipped byte
    CorruptShards,
}

/// One simulated host
pub struct MemoryHost {
    host: Host,
    fault: Mutex<HostFault>,
    latency: Mutex<Duration>,
    contracts: Mutex<HashMap<Uuid, Contract>>,
    shards: Mutex<HashMap<ShardKey, Bytes>>,
}

impl MemoryHost {
    fn new(host: Host) -> Self {
        Self {
            host,
            fault: Mutex::new(HostFault::Healthy),
            latency: Mutex::new(Duration::ZERO),
            contracts: Mutex::new(HashMap::new()),
            shards: Mutex::new(HashMap::new()),
        }
    }

    pub fn host(&self) -> &Host {
        &self.host
    }

    pub fn shard_count(&self) -> usize {
        self.shards.lock().len()
    }

    pub fn contract_count(&self) -> usize {
        self.contracts.lock().len()
    }

    async fn respond(&self) -> Result<HostFault, HostError> {
        let latency = *self.latency.lock();
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }

        let fault = *self.fault.lock();
        match fault {
            HostFault::Offline => Err(HostError::Unreachable(self.host.address.clone())),
            HostFault::Hang => std::future::pending().await,
            other => Ok(other),
        }
    }
}

/// Collection of [`MemoryHost`]s behind the [`HostNetworkClient`] trait
#[derive(Default)]
pub struct MemoryHostNetwork {
    hosts: RwLock<Vec<Arc<MemoryHost>>>,
    contracts_formed: AtomicUsize,
    contracts_released: AtomicUsize,
}

impl MemoryHostNetwork {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Network of `count` healthy hosts sharing `terms`
    pub fn with_hosts(count: usize, terms: ContractTerms) -> Arc<Self> {
        let network = Self::new();
        for _ in 0..count {
            network.add_host(terms);
        }
        network
    }

    /// Add a healthy host with a fresh key
    pub fn add_host(&self, terms: ContractTerms) -> HostId {
        let mut hosts = self.hosts.write();
        let mut public_key = [0u8; 32];
        public_key[..16].copy_from_slice(Uuid::new_v4().as_bytes());
        let address = format!("127.0.0.1:{}", 9982 + hosts.len());
        let host = Host::new(address, public_key, terms);
        let id = host.id;
        hosts.push(Arc::new(MemoryHost::new(host)));
        id
    }

    pub fn host_ids(&self) -> Vec<HostId> {
        self.hosts.read().iter().map(|h| h.host.id).collect()
    }

    pub fn host(&self, id: HostId) -> Option<Arc<MemoryHost>> {
        self.hosts.read().iter().find(|h| h.host.id == id).cloned()
    }

    /// Remove a host entirely, as if it left the network
    pub fn remove_host(&self, id: HostId) -> bool {
        let mut hosts = self.hosts.write();
        let before = hosts.len();
        hosts.retain(|h| h.host.id != id);
        hosts.len() != before
    }

    pub fn set_fault(&self, id: HostId, fault: HostFault) {
        if let Some(host) = self.host(id) {
            *host.fault.lock() = fault;
        }
    }

    pub fn set_latency(&self, id: HostId, latency: Duration) {
        if let Some(host) = self.host(id) {
            *host.latency.lock() = latency;
        }
    }

    /// Delete a stored shard behind the renter's back
    pub fn drop_shard(&self, id: HostId, key: ShardKey) -> bool {
        self.host(id)
            .map(|h| h.shards.lock().remove(&key).is_some())
            .unwrap_or(false)
    }

    pub fn contracts_formed(&self) -> usize {
        self.contracts_formed.load(Ordering::SeqCst)
    }

    pub fn contracts_released(&self) -> usize {
        self.contracts_released.load(Ordering::SeqCst)
    }

    /// Contracts formed and not yet released, across all hosts
    pub fn active_contracts(&self) -> usize {
        self.hosts.read().iter().map(|h| h.contract_count()).sum()
    }

    pub fn stored_shards(&self) -> usize {
        self.hosts.read().iter().map(|h| h.shard_count()).sum()
    }

    fn lookup(&self, id: HostId) -> Result<Arc<MemoryHost>, HostError> {
        self.host(id)
            .ok_or_else(|| HostError::Unreachable(format!("unknown host {id}")))
    }
}

#[async_trait]
impl HostNetworkClient for MemoryHostNetwork {
    async fn contractable_hosts(&self) -> Result<Vec<Host>, HostError> {
        Ok(self
            .hosts
            .read()
            .iter()
            .filter(|h| *h.fault.lock() != HostFault::Offline)
            .map(|h| h.host.clone())
            .collect())
    }

    async fn form_contract(
        &self,
        host: &Host,
        request: ContractRequest,
    ) -> Result<Contract, HostError> {
        let memory_host = self.lookup(host.id)?;
        if memory_host.respond().await? == HostFault::Decline {
            return Err(HostError::Declined("not accepting contracts".into()));
        }
        if request.duration > memory_host.host.terms.max_duration {
            return Err(HostError::Declined(format!(
                "duration {} exceeds {}",
                request.duration, memory_host.host.terms.max_duration
            )));
        }

        let contract = Contract::accept(host.id, &request);
        memory_host
            .contracts
            .lock()
            .insert(contract.id, contract.clone());
        self.contracts_formed.fetch_add(1, Ordering::SeqCst);
        Ok(contract)
    }

    async fn store_shard(
        &self,
        contract: &Contract,
        key: ShardKey,
        data: Bytes,
    ) -> Result<(), HostError> {
        let memory_host = self.lookup(contract.host_id)?;
        if memory_host.respond().await? == HostFault::RejectStores {
            return Err(HostError::Declined("storage full".into()));
        }
        if !memory_host.contracts.lock().contains_key(&contract.id) {
            return Err(HostError::Declined(format!("unknown contract {}", contract.id)));
        }
        memory_host.shards.lock().insert(key, data);
        Ok(())
    }

    async fn fetch_shard(&self, host: HostId, key: ShardKey) -> Result<Bytes, HostError> {
        let memory_host = self.lookup(host)?;
        let fault = memory_host.respond().await?;

        let data = memory_host
            .shards
            .lock()
            .get(&key)
            .cloned()
            .ok_or(HostError::NotFound(key))?;

        if fault == HostFault::CorruptShards && !data.is_empty() {
            let mut corrupted = BytesMut::from(&data[..]);
            corrupted[0] ^= 0xFF;
            return Ok(corrupted.freeze());
        }
        Ok(data)
    }

    async fn release_contract(&self, contract: &Contract) -> Result<(), HostError> {
        let memory_host = self.lookup(contract.host_id)?;
        memory_host.respond().await?;

        if memory_host.contracts.lock().remove(&contract.id).is_some() {
            memory_host
                .shards
                .lock()
                .remove(&ShardKey::new(contract.file_id, contract.shard_index));
            self.contracts_released.fetch_add(1, Ordering::SeqCst);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn terms() -> ContractTerms {
        ContractTerms {
            price_per_byte_block: 1,
            max_duration: 10_000,
        }
    }

    fn request(shard_index: usize) -> ContractRequest {
        ContractRequest {
            renter_id: Uuid::new_v4(),
            file_id: Uuid::nil(),
            shard_index,
            shard_size: 4,
            duration: 100,
            payment: 400,
        }
    }

    #[tokio::test]
    async fn test_store_fetch_release() {
        let network = MemoryHostNetwork::with_hosts(1, terms());
        let host = network.contractable_hosts().await.unwrap().remove(0);

        let contract = network.form_contract(&host, request(0)).await.unwrap();
        let key = ShardKey::new(Uuid::nil(), 0);
        network
            .store_shard(&contract, key, Bytes::from_static(b"abcd"))
            .await
            .unwrap();
        assert_eq!(
            network.fetch_shard(host.id, key).await.unwrap(),
            Bytes::from_static(b"abcd")
        );

        network.release_contract(&contract).await.unwrap();
        assert_eq!(network.contracts_released(), 1);
        assert_eq!(network.active_contracts(), 0);
        assert_eq!(
            network.fetch_shard(host.id, key).await.unwrap_err(),
            HostError::NotFound(key)
        );
    }

    #[tokio::test]
    async fn test_faults() {
        let network = MemoryHostNetwork::with_hosts(2, terms());
        let ids = network.host_ids();
        let hosts = network.contractable_hosts().await.unwrap();

        network.set_fault(ids[0], HostFault::Decline);
        assert!(matches!(
            network.form_contract(&hosts[0], request(0)).await,
            Err(HostError::Declined(_))
        ));

        network.set_fault(ids[1], HostFault::Offline);
        assert_eq!(network.contractable_hosts().await.unwrap().len(), 1);
        assert!(matches!(
            network.form_contract(&hosts[1], request(1)).await,
            Err(HostError::Unreachable(_))
        ));
        assert_eq!(network.contracts_formed(), 0);
    }

    #[tokio::test]
    async fn test_corrupt_shards() {
        let network = MemoryHostNetwork::with_hosts(1, terms());
        let host = network.contractable_hosts().await.unwrap().remove(0);
        let contract = network.form_contract(&host, request(0)).await.unwrap();
        let key = ShardKey::new(Uuid::nil(), 0);
        network
            .store_shard(&contract, key, Bytes::from_static(b"abcd"))
            .await
            .unwrap();

        network.set_fault(host.id, HostFault::CorruptShards);
        let served = network.fetch_shard(host.id, key).await.unwrap();
        assert_ne!(served, Bytes::from_static(b"abcd"));
        assert_eq!(served.len(), 4);
    }

    #[tokio::test]
    async fn test_removed_host_is_gone() {
        let network = MemoryHostNetwork::with_hosts(3, terms());
        let id = network.host_ids()[1];
        assert!(network.remove_host(id));
        assert!(!network.remove_host(id));
        assert_eq!(network.contractable_hosts().await.unwrap().len(), 2);
        assert!(matches!(
            network.fetch_shard(id, ShardKey::new(Uuid::nil(), 0)).await,
            Err(HostError::Unreachable(_))
        ));
    }
}
