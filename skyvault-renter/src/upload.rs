//! Erasure-coded upload pipeline
//!
//! A file is encoded into `d` data and `p` parity shards and each shard is
//! placed on its own host. Placement runs in a coordinator task that owns
//! the manifest and publishes snapshots over a `watch` channel:
//!
//! ```text
//! upload_file ──► encode ──► coordinator ──► JoinSet<place shard i on host h>
//!      ▲                          │
//!      └──── d placements ────────┘ (watch) ──► UploadHandle::wait_complete
//! ```
//!
//! The caller gets its handle back once `d` shards are stored. Remaining
//! shards keep going in the background; failed ones move to spare hosts.

use crate::client::HostError;
use crate::error::{RenterError, Result};
use crate::host::{Contract, Host};
use crate::registry::HostRegistry;
use bytes::Bytes;
use futures::future::join_all;
use metrics::{counter, histogram};
use skyvault_core::{
    metric_names as names, EncodedFile, ErasureConfig, ErasureEncoder, FileManifest, Placement,
    ShardData, ShardKey, PARALLEL_ENCODE_THRESHOLD,
};
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::watch;
use tokio::task::JoinSet;
use tracing::{info, instrument, warn};
use uuid::Uuid;

/// Lifecycle of an upload
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadStatus {
    /// Placements still outstanding
    Placing,
    /// Every placement settled with at least `d` shards stored
    Complete,
    /// Fewer than `d` shards could be stored; contracts were released
    Failed(RenterError),
}

/// Snapshot published by the upload coordinator
#[derive(Debug, Clone)]
pub struct UploadProgress {
    pub manifest: FileManifest,
    pub contracts: Vec<Contract>,
    pub failed_placements: usize,
    pub status: UploadStatus,
}

impl UploadProgress {
    fn reached_threshold(&self) -> bool {
        self.status != UploadStatus::Placing
            || self.manifest.placed_pieces() >= self.manifest.data_pieces
    }
}

/// Caller's view of an upload that has reached its data threshold
#[derive(Debug, Clone)]
pub struct UploadHandle {
    file_id: Uuid,
    progress: watch::Receiver<UploadProgress>,
}

impl UploadHandle {
    pub fn file_id(&self) -> Uuid {
        self.file_id
    }

    /// Current manifest; grows as background placements finish
    pub fn manifest(&self) -> FileManifest {
        self.progress.borrow().manifest.clone()
    }

    /// Contracts formed so far
    pub fn contracts(&self) -> Vec<Contract> {
        self.progress.borrow().contracts.clone()
    }

    pub fn progress(&self) -> UploadProgress {
        self.progress.borrow().clone()
    }

    pub fn is_complete(&self) -> bool {
        self.progress.borrow().status != UploadStatus::Placing
    }

    /// Wait for every placement to settle and return the final manifest
    pub async fn wait_complete(&self) -> Result<FileManifest> {
        let mut rx = self.progress.clone();
        let progress = rx
            .wait_for(|p| p.status != UploadStatus::Placing)
            .await
            .map_err(|_| RenterError::Core("upload coordinator stopped".into()))?;

        if let UploadStatus::Failed(e) = &progress.status {
            return Err(e.clone());
        }
        Ok(progress.manifest.clone())
    }
}

/// Encodes files and distributes their shards
pub struct UploadPipeline {
    registry: Arc<HostRegistry>,
}

impl UploadPipeline {
    pub fn new(registry: Arc<HostRegistry>) -> Self {
        Self { registry }
    }

    /// Upload `data` as `data_pieces` + `parity_pieces` shards.
    ///
    /// Returns once `data_pieces` shards are stored. Fails with
    /// `InsufficientHosts` before contacting any host when the registry
    /// offers fewer than `data_pieces + parity_pieces` hosts.
    #[instrument(skip(self, data), fields(len = data.len()))]
    pub async fn upload_file(
        &self,
        data: Bytes,
        data_pieces: usize,
        parity_pieces: usize,
    ) -> Result<UploadHandle> {
        let config = ErasureConfig::new(data_pieces, parity_pieces)
            .map_err(|e| RenterError::InvalidParameters(e.to_string()))?;
        let required_hosts = config.total_shards();

        let mut hosts = VecDeque::from(self.registry.contractable_hosts().await?);
        if hosts.len() < required_hosts {
            warn!(
                available = hosts.len(),
                required = required_hosts,
                "Not enough contractable hosts for upload"
            );
            return Err(RenterError::InsufficientHosts {
                available: hosts.len(),
                required: required_hosts,
            });
        }

        let encoded = encode(config, data).await?;
        let file_id = Uuid::new_v4();
        let manifest = FileManifest::new(
            file_id,
            config,
            encoded.original_len as u64,
            encoded.padding_len as u64,
            encoded.shard_size as u64,
        );

        let primary: Vec<Host> = hosts.drain(..required_hosts).collect();
        let (tx, rx) = watch::channel(UploadProgress {
            manifest,
            contracts: Vec::new(),
            failed_placements: 0,
            status: UploadStatus::Placing,
        });

        let coordinator = PlacementCoordinator {
            registry: self.registry.clone(),
            file_id,
            shard_size: encoded.shard_size as u64,
            required: data_pieces,
            spares: hosts,
            progress: tx,
            started: Instant::now(),
        };
        tokio::spawn(coordinator.run(encoded.shards, primary));

        let handle = UploadHandle {
            file_id,
            progress: rx,
        };

        {
            let mut rx = handle.progress.clone();
            let progress = rx
                .wait_for(UploadProgress::reached_threshold)
                .await
                .map_err(|_| RenterError::Core("upload coordinator stopped".into()))?;
            if let UploadStatus::Failed(e) = &progress.status {
                return Err(e.clone());
            }
        }

        info!(%file_id, data_pieces, parity_pieces, "Upload reached data threshold");
        Ok(handle)
    }

    /// Upload and wait for every placement to settle
    pub async fn upload_file_blocking(
        &self,
        data: Bytes,
        data_pieces: usize,
        parity_pieces: usize,
    ) -> Result<FileManifest> {
        self.upload_file(data, data_pieces, parity_pieces)
            .await?
            .wait_complete()
            .await
    }
}

async fn encode(config: ErasureConfig, data: Bytes) -> Result<EncodedFile> {
    let encoded = tokio::task::spawn_blocking(move || {
        let encoder = ErasureEncoder::with_config(config)?;
        if data.len() >= PARALLEL_ENCODE_THRESHOLD {
            encoder.encode_parallel(&data)
        } else {
            encoder.encode(&data)
        }
    })
    .await
    .map_err(|e| RenterError::Core(format!("encode task failed: {e}")))??;
    Ok(encoded)
}

struct PlacementAttempt {
    shard: ShardData,
    host: Host,
    result: std::result::Result<Contract, HostError>,
}

/// Owns the manifest of one upload until every placement settles
struct PlacementCoordinator {
    registry: Arc<HostRegistry>,
    file_id: Uuid,
    shard_size: u64,
    required: usize,
    spares: VecDeque<Host>,
    progress: watch::Sender<UploadProgress>,
    started: Instant,
}

impl PlacementCoordinator {
    async fn run(mut self, shards: Vec<ShardData>, hosts: Vec<Host>) {
        let mut tasks = JoinSet::new();
        for (shard, host) in shards.into_iter().zip(hosts) {
            self.spawn_placement(&mut tasks, shard, host);
        }

        let mut placed = 0usize;
        while let Some(joined) = tasks.join_next().await {
            let attempt = match joined {
                Ok(attempt) => attempt,
                Err(e) => {
                    warn!(file_id = %self.file_id, error = %e, "Placement task aborted");
                    self.progress.send_modify(|p| p.failed_placements += 1);
                    continue;
                }
            };

            match attempt.result {
                Ok(contract) => {
                    counter!(names::SHARDS_PLACED).increment(1);
                    let placement = Placement {
                        host_id: attempt.host.id,
                        shard_index: attempt.shard.index,
                        checksum: attempt.shard.checksum,
                    };
                    self.progress.send_modify(|p| {
                        p.manifest.add_placement(placement);
                        p.contracts.push(contract);
                    });
                    placed += 1;
                }
                Err(e) => {
                    counter!(names::PLACEMENT_FAILURES).increment(1);
                    self.progress.send_modify(|p| p.failed_placements += 1);

                    match self.spares.pop_front() {
                        Some(spare) => {
                            warn!(
                                shard = attempt.shard.index,
                                host_id = %attempt.host.id,
                                spare_id = %spare.id,
                                error = %e,
                                "Placement failed, retrying on spare host"
                            );
                            self.spawn_placement(&mut tasks, attempt.shard, spare);
                        }
                        None => warn!(
                            shard = attempt.shard.index,
                            host_id = %attempt.host.id,
                            error = %e,
                            "Placement failed, no spare hosts left"
                        ),
                    }
                }
            }
        }

        if placed < self.required {
            self.abandon(placed).await;
            return;
        }

        histogram!(names::UPLOAD_DURATION).record(self.started.elapsed().as_secs_f64());
        info!(file_id = %self.file_id, placed, "Upload complete");
        self.progress
            .send_modify(|p| p.status = UploadStatus::Complete);
    }

    fn spawn_placement(&self, tasks: &mut JoinSet<PlacementAttempt>, shard: ShardData, host: Host) {
        let registry = self.registry.clone();
        let file_id = self.file_id;
        let shard_size = self.shard_size;

        tasks.spawn(async move {
            let result = place_shard(&registry, &host, file_id, &shard, shard_size).await;
            PlacementAttempt {
                shard,
                host,
                result,
            }
        });
    }

    /// Release every formed contract and publish the failure
    async fn abandon(&self, placed: usize) {
        let contracts = self.progress.borrow().contracts.clone();
        let released = join_all(contracts.iter().map(|c| self.registry.release_contract(c)))
            .await
            .into_iter()
            .filter(|ok| *ok)
            .count();
        counter!(names::CONTRACTS_RELEASED).increment(released as u64);

        let error = RenterError::InsufficientRedundancy {
            accepted: placed,
            required: self.required,
        };
        warn!(
            file_id = %self.file_id,
            placed,
            required = self.required,
            released,
            "Upload failed, contracts released"
        );
        self.progress.send_modify(|p| {
            p.contracts.clear();
            p.status = UploadStatus::Failed(error);
        });
    }
}

/// Form a contract with `host` and store `shard` under it
async fn place_shard(
    registry: &HostRegistry,
    host: &Host,
    file_id: Uuid,
    shard: &ShardData,
    shard_size: u64,
) -> std::result::Result<Contract, HostError> {
    let contract = registry
        .form_contract(host, file_id, shard.index, shard_size)
        .await?;

    let key = ShardKey::new(file_id, shard.index);
    if let Err(e) = registry.store_shard(&contract, key, shard.data.clone()).await {
        registry.release_contract(&contract).await;
        return Err(e);
    }
    Ok(contract)
}
