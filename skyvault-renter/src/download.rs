//! Download orchestrator
//!
//! Every placement in the manifest is fetched concurrently. The first `d`
//! shards that pass size and checksum verification win; the remaining
//! fetches are aborted and the file is rebuilt from those shards.

use crate::error::{RenterError, Result};
use crate::registry::HostRegistry;
use bytes::Bytes;
use metrics::{counter, histogram};
use skyvault_core::{metric_names as names, ErasureEncoder, FileManifest, Placement, ShardData};
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

/// How `download_to_disk` returns
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DownloadMode {
    /// Return after the file is written
    #[default]
    Blocking,
    /// Return a job handle immediately
    Async,
}

/// Fetches shards and reconstructs files
pub struct DownloadOrchestrator {
    registry: Arc<HostRegistry>,
}

impl DownloadOrchestrator {
    pub fn new(registry: Arc<HostRegistry>) -> Self {
        Self { registry }
    }

    /// Download `manifest` into memory
    pub async fn download_by_stream(&self, manifest: &FileManifest) -> Result<Bytes> {
        self.fetch_and_decode(manifest, CancellationToken::new())
            .await
    }

    /// Download `manifest` and write it to `destination`
    pub async fn download_to_path(
        &self,
        manifest: &FileManifest,
        destination: &Path,
        cancel: CancellationToken,
    ) -> Result<u64> {
        let data = self.fetch_and_decode(manifest, cancel.clone()).await?;
        if cancel.is_cancelled() {
            return Err(RenterError::Cancelled);
        }
        tokio::fs::write(destination, &data).await?;
        Ok(data.len() as u64)
    }

    /// Collect `d` verified shards and rebuild the file
    #[instrument(skip(self, manifest, cancel), fields(file_id = %manifest.file_id))]
    pub async fn fetch_and_decode(
        &self,
        manifest: &FileManifest,
        cancel: CancellationToken,
    ) -> Result<Bytes> {
        manifest.validate()?;
        let started = Instant::now();
        let required = manifest.data_pieces;

        let shards = match self.collect_shards(manifest, &cancel).await {
            Ok(shards) => shards,
            Err(e) => {
                counter!(names::DOWNLOADS_FAILED).increment(1);
                return Err(e);
            }
        };

        let received = shards.iter().filter(|s| s.is_some()).count();
        if received < required {
            counter!(names::DOWNLOADS_FAILED).increment(1);
            warn!(received, required, "Not enough valid shards to reconstruct");
            return Err(RenterError::ReconstructionFailed { received, required });
        }

        let config = manifest.erasure_config()?;
        let original_length = manifest.original_length as usize;
        let data = tokio::task::spawn_blocking(move || {
            ErasureEncoder::with_config(config)?.decode(&shards, original_length)
        })
        .await
        .map_err(|e| RenterError::Core(format!("decode task failed: {e}")))??;

        counter!(names::DOWNLOADS_COMPLETED).increment(1);
        histogram!(names::DOWNLOAD_DURATION).record(started.elapsed().as_secs_f64());
        info!(bytes = data.len(), received, "Download reconstructed");
        Ok(data)
    }

    /// Fan out one fetch per placement and fan in until `d` distinct shards
    /// verify, every fetch has answered, the deadline passes or `cancel`
    /// fires.
    async fn collect_shards(
        &self,
        manifest: &FileManifest,
        cancel: &CancellationToken,
    ) -> Result<Vec<Option<ShardData>>> {
        let required = manifest.data_pieces;
        let mut shards: Vec<Option<ShardData>> = vec![None; manifest.total_pieces()];
        let mut received = 0usize;

        let mut fetches = JoinSet::new();
        for placement in manifest.placements.iter().cloned() {
            let registry = self.registry.clone();
            let key = manifest.shard_key(placement.shard_index);
            let cancel = cancel.clone();
            fetches.spawn(async move {
                let result = tokio::select! {
                    _ = cancel.cancelled() => None,
                    result = registry.fetch_shard(placement.host_id, key) => Some(result),
                };
                (placement, result)
            });
        }

        let deadline = tokio::time::sleep(self.registry.config().download_deadline());
        tokio::pin!(deadline);

        while received < required {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    fetches.abort_all();
                    return Err(RenterError::Cancelled);
                }
                _ = &mut deadline => {
                    warn!(received, required, "Download deadline passed");
                    break;
                }
                joined = fetches.join_next() => {
                    let Some(joined) = joined else { break };
                    let (placement, result) = match joined {
                        Ok(done) => done,
                        Err(e) => {
                            warn!(error = %e, "Fetch task aborted");
                            continue;
                        }
                    };
                    let Some(result) = result else { continue };

                    match result {
                        Ok(bytes) => {
                            if shards[placement.shard_index].is_some() {
                                continue;
                            }
                            match verify_shard(manifest, &placement, bytes) {
                                Some(shard) => {
                                    shards[placement.shard_index] = Some(shard);
                                    received += 1;
                                }
                                None => {
                                    counter!(names::SHARD_FETCH_FAILURES).increment(1);
                                    warn!(
                                        host_id = %placement.host_id,
                                        shard = placement.shard_index,
                                        "Shard failed verification, treating host as unresponsive"
                                    );
                                }
                            }
                        }
                        Err(e) => {
                            counter!(names::SHARD_FETCH_FAILURES).increment(1);
                            debug!(
                                host_id = %placement.host_id,
                                shard = placement.shard_index,
                                error = %e,
                                "Shard fetch failed"
                            );
                        }
                    }
                }
            }
        }

        // Stragglers are no longer needed
        fetches.abort_all();
        Ok(shards)
    }
}

/// Accept `bytes` as shard `placement.shard_index` if size and checksum match
fn verify_shard(manifest: &FileManifest, placement: &Placement, bytes: Bytes) -> Option<ShardData> {
    if bytes.len() as u64 != manifest.shard_size || !placement.checksum.verify(&bytes) {
        return None;
    }
    let is_parity = placement.shard_index >= manifest.data_pieces;
    Some(ShardData::new(placement.shard_index, bytes, is_parity))
}
