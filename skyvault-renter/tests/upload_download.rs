//! Upload and download against an in-memory host network

use proptest::prelude::*;
use skyvault_renter::{
    ContractTerms, DownloadMode, DownloadStatus, Renter, RenterConfig, RenterError, UploadStatus,
};
use skyvault_testkit::{cheap_terms, random_bytes, HostFault, MemoryHostNetwork};
use std::sync::Arc;
use std::time::Duration;

fn renter(network: &Arc<MemoryHostNetwork>) -> Renter {
    Renter::new(network.clone(), RenterConfig::for_testing()).unwrap()
}

#[tokio::test]
async fn test_roundtrip() {
    let network = MemoryHostNetwork::with_hosts(5, cheap_terms());
    let renter = renter(&network);
    let data = random_bytes(10_000);

    let manifest = renter.upload_file_blocking(data.clone(), 3, 2).await.unwrap();
    assert_eq!(manifest.placements.len(), 5);
    assert_eq!(manifest.original_length, 10_000);
    assert_eq!(network.stored_shards(), 5);

    let downloaded = renter.download_by_stream(&manifest).await.unwrap();
    assert_eq!(downloaded, data);
}

#[tokio::test]
async fn test_too_few_hosts_forms_no_contracts() {
    let network = MemoryHostNetwork::with_hosts(4, cheap_terms());
    let renter = renter(&network);

    let err = renter
        .upload_file(random_bytes(100), 3, 2)
        .await
        .unwrap_err();
    assert_eq!(
        err,
        RenterError::InsufficientHosts {
            available: 4,
            required: 5
        }
    );
    assert_eq!(network.contracts_formed(), 0);
}

#[tokio::test]
async fn test_invalid_erasure_parameters() {
    let network = MemoryHostNetwork::with_hosts(5, cheap_terms());
    let renter = renter(&network);

    assert!(matches!(
        renter.upload_file(random_bytes(10), 0, 2).await,
        Err(RenterError::InvalidParameters(_))
    ));
    assert!(matches!(
        renter.upload_file(random_bytes(10), 200, 100).await,
        Err(RenterError::InvalidParameters(_))
    ));
    assert_eq!(network.contracts_formed(), 0);
}

#[tokio::test]
async fn test_single_data_piece_survives_host_loss() {
    let network = MemoryHostNetwork::with_hosts(5, cheap_terms());
    let renter = renter(&network);
    let data = random_bytes(100);

    let manifest = renter.upload_file_blocking(data.clone(), 1, 4).await.unwrap();
    assert_eq!(manifest.placements.len(), 5);

    network.remove_host(manifest.placements[0].host_id);
    assert_eq!(renter.download_by_stream(&manifest).await.unwrap(), data);
}

#[tokio::test]
async fn test_losing_parity_count_of_shards() {
    let network = MemoryHostNetwork::with_hosts(7, cheap_terms());
    let renter = renter(&network);
    let data = random_bytes(4_096);

    let manifest = renter.upload_file_blocking(data.clone(), 4, 3).await.unwrap();
    for placement in manifest.placements.iter().take(3) {
        assert!(network.drop_shard(placement.host_id, manifest.shard_key(placement.shard_index)));
    }
    assert_eq!(renter.download_by_stream(&manifest).await.unwrap(), data);

    // One more loss is beyond the parity budget
    let fourth = &manifest.placements[3];
    network.drop_shard(fourth.host_id, manifest.shard_key(fourth.shard_index));
    assert_eq!(
        renter.download_by_stream(&manifest).await.unwrap_err(),
        RenterError::ReconstructionFailed {
            received: 3,
            required: 4
        }
    );
}

#[tokio::test]
async fn test_no_parity() {
    let network = MemoryHostNetwork::with_hosts(3, cheap_terms());
    let renter = renter(&network);
    let data = random_bytes(1_000);

    let manifest = renter.upload_file_blocking(data.clone(), 3, 0).await.unwrap();
    assert_eq!(manifest.parity_pieces, 0);
    assert_eq!(renter.download_by_stream(&manifest).await.unwrap(), data);
}

#[tokio::test]
async fn test_empty_file() {
    let network = MemoryHostNetwork::with_hosts(3, cheap_terms());
    let renter = renter(&network);

    let manifest = renter
        .upload_file_blocking(bytes::Bytes::new(), 2, 1)
        .await
        .unwrap();
    assert_eq!(manifest.original_length, 0);
    assert!(renter.download_by_stream(&manifest).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_expensive_hosts_are_skipped() {
    let network = MemoryHostNetwork::with_hosts(2, cheap_terms());
    network.add_host(ContractTerms {
        price_per_byte_block: 1_000_000,
        max_duration: 1_000_000,
    });
    network.add_host(ContractTerms {
        price_per_byte_block: 1,
        max_duration: 10,
    });
    let renter = renter(&network);

    assert_eq!(renter.contractable_hosts().await.unwrap().len(), 2);
    assert!(matches!(
        renter.upload_file(random_bytes(10), 2, 1).await,
        Err(RenterError::InsufficientHosts { available: 2, required: 3 })
    ));
}

#[tokio::test]
async fn test_failed_placement_moves_to_spare_host() {
    let network = MemoryHostNetwork::with_hosts(6, cheap_terms());
    let renter = renter(&network);

    // Cheapest-first ordering with equal prices falls back to host ID order
    let mut ids = network.host_ids();
    ids.sort();
    network.set_fault(ids[0], HostFault::Decline);

    let data = random_bytes(2_000);
    let manifest = renter.upload_file_blocking(data.clone(), 3, 2).await.unwrap();
    assert_eq!(manifest.placements.len(), 5);
    assert!(manifest.placements.iter().all(|p| p.host_id != ids[0]));
    assert!(manifest.placements.iter().any(|p| p.host_id == ids[5]));
    assert_eq!(renter.download_by_stream(&manifest).await.unwrap(), data);
}

#[tokio::test]
async fn test_insufficient_redundancy_releases_contracts() {
    let network = MemoryHostNetwork::with_hosts(5, cheap_terms());
    let ids = network.host_ids();
    for id in &ids[..3] {
        network.set_fault(*id, HostFault::RejectStores);
    }
    let renter = renter(&network);

    let err = renter
        .upload_file(random_bytes(500), 3, 2)
        .await
        .unwrap_err();
    assert_eq!(
        err,
        RenterError::InsufficientRedundancy {
            accepted: 2,
            required: 3
        }
    );
    assert_eq!(network.contracts_formed(), 5);
    assert_eq!(network.active_contracts(), 0);
    assert_eq!(network.stored_shards(), 0);
}

#[tokio::test]
async fn test_upload_returns_at_data_threshold() {
    let network = MemoryHostNetwork::with_hosts(5, cheap_terms());
    let slow = network.host_ids()[0];
    network.set_latency(slow, Duration::from_millis(200));
    let renter = renter(&network);

    let handle = renter.upload_file(random_bytes(300), 3, 2).await.unwrap();
    assert!(!handle.is_complete());
    let early = handle.manifest();
    assert!(early.placed_pieces() >= 3);
    assert!(early.placements.iter().all(|p| p.host_id != slow));

    let complete = handle.wait_complete().await.unwrap();
    assert_eq!(complete.placements.len(), 5);
    assert!(complete.placements.iter().any(|p| p.host_id == slow));
    assert_eq!(handle.progress().status, UploadStatus::Complete);
    assert_eq!(handle.contracts().len(), 5);
}

#[tokio::test]
async fn test_corrupted_shards_are_skipped() {
    let network = MemoryHostNetwork::with_hosts(4, cheap_terms());
    let renter = renter(&network);
    let data = random_bytes(1_234);
    let manifest = renter.upload_file_blocking(data.clone(), 2, 2).await.unwrap();

    network.set_fault(manifest.placements[0].host_id, HostFault::CorruptShards);
    network.set_fault(manifest.placements[1].host_id, HostFault::CorruptShards);
    assert_eq!(renter.download_by_stream(&manifest).await.unwrap(), data);

    network.set_fault(manifest.placements[2].host_id, HostFault::CorruptShards);
    assert_eq!(
        renter.download_by_stream(&manifest).await.unwrap_err(),
        RenterError::ReconstructionFailed {
            received: 1,
            required: 2
        }
    );
}

#[tokio::test]
async fn test_hanging_hosts_time_out() {
    let network = MemoryHostNetwork::with_hosts(3, cheap_terms());
    let renter = renter(&network);
    let data = random_bytes(64);
    let manifest = renter.upload_file_blocking(data.clone(), 2, 1).await.unwrap();

    network.set_fault(manifest.placements[0].host_id, HostFault::Hang);
    assert_eq!(renter.download_by_stream(&manifest).await.unwrap(), data);

    network.set_fault(manifest.placements[1].host_id, HostFault::Hang);
    assert!(matches!(
        renter.download_by_stream(&manifest).await,
        Err(RenterError::ReconstructionFailed { received: 1, .. })
    ));
}

#[tokio::test]
async fn test_download_to_disk_blocking() {
    let network = MemoryHostNetwork::with_hosts(5, cheap_terms());
    let renter = renter(&network);
    let data = random_bytes(5_000);
    let manifest = renter.upload_file_blocking(data.clone(), 3, 2).await.unwrap();

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("blocking.dat");
    let handle = renter
        .download_to_disk(&manifest, &path, DownloadMode::Blocking)
        .await
        .unwrap();

    assert!(matches!(handle.status(), DownloadStatus::Completed(_)));
    assert_eq!(std::fs::read(&path).unwrap(), data.to_vec());
}

#[tokio::test]
async fn test_download_to_disk_async_wait_is_idempotent() {
    let network = MemoryHostNetwork::with_hosts(5, cheap_terms());
    let renter = renter(&network);
    let data = random_bytes(5_000);
    let manifest = renter.upload_file_blocking(data.clone(), 3, 2).await.unwrap();

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("async.dat");
    let handle = renter
        .download_to_disk(&manifest, &path, DownloadMode::Async)
        .await
        .unwrap();

    let (a, b) = tokio::join!(handle.wait(), renter.wait_for_download(handle.id()));
    let first = a.unwrap();
    assert_eq!(first, b.unwrap());
    assert_eq!(first.bytes_written, 5_000);

    // Terminal state is read back, not recomputed
    assert_eq!(handle.wait().await.unwrap(), first);
    assert_eq!(renter.wait_for_download(handle.id()).await.unwrap(), first);
    assert_eq!(std::fs::read(&path).unwrap(), data.to_vec());
}

#[tokio::test]
async fn test_cancel_async_download() {
    let network = MemoryHostNetwork::with_hosts(3, cheap_terms());
    let renter = renter(&network);
    let manifest = renter
        .upload_file_blocking(random_bytes(256), 2, 1)
        .await
        .unwrap();
    for placement in &manifest.placements {
        network.set_fault(placement.host_id, HostFault::Hang);
    }

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("cancelled.dat");
    let handle = renter
        .download_to_disk(&manifest, &path, DownloadMode::Async)
        .await
        .unwrap();
    renter.cancel_download(handle.id()).unwrap();

    let err = tokio::time::timeout(Duration::from_secs(2), handle.wait())
        .await
        .expect("cancelled job should settle promptly")
        .unwrap_err();
    assert_eq!(err, RenterError::Cancelled);
    assert_eq!(handle.status(), DownloadStatus::Failed(RenterError::Cancelled));
    assert!(!path.exists());

    // Cancelling a terminal job changes nothing
    handle.cancel();
    assert_eq!(handle.status(), DownloadStatus::Failed(RenterError::Cancelled));
}

#[tokio::test]
async fn test_cancel_running_download() {
    let network = MemoryHostNetwork::with_hosts(3, cheap_terms());
    let config = RenterConfig {
        fetch_timeout_ms: 60_000,
        download_deadline_ms: 60_000,
        ..RenterConfig::for_testing()
    };
    let renter = Renter::new(network.clone(), config).unwrap();
    let manifest = renter
        .upload_file_blocking(random_bytes(256), 2, 1)
        .await
        .unwrap();
    for placement in &manifest.placements {
        network.set_latency(placement.host_id, Duration::from_secs(30));
    }

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("running.dat");
    let handle = renter
        .download_to_disk(&manifest, &path, DownloadMode::Async)
        .await
        .unwrap();

    tokio::time::timeout(Duration::from_secs(2), async {
        while handle.status() != DownloadStatus::InProgress {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("job should start fetching");

    renter.cancel_download(handle.id()).unwrap();
    let err = tokio::time::timeout(Duration::from_secs(2), handle.wait())
        .await
        .expect("running job should stop promptly on cancel")
        .unwrap_err();
    assert_eq!(err, RenterError::Cancelled);
    assert_eq!(handle.status(), DownloadStatus::Failed(RenterError::Cancelled));

    // Nothing is written after the job settles
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(!path.exists());
}

#[tokio::test]
async fn test_unknown_job() {
    let network = MemoryHostNetwork::with_hosts(1, cheap_terms());
    let renter = renter(&network);
    let id = uuid::Uuid::new_v4();
    assert_eq!(
        renter.wait_for_download(id).await.unwrap_err(),
        RenterError::JobNotFound(id)
    );
    assert_eq!(
        renter.cancel_download(id).unwrap_err(),
        RenterError::JobNotFound(id)
    );
}

#[tokio::test]
async fn test_prune_observed_jobs() {
    let network = MemoryHostNetwork::with_hosts(3, cheap_terms());
    let renter = renter(&network);
    let manifest = renter
        .upload_file_blocking(random_bytes(100), 2, 1)
        .await
        .unwrap();

    let dir = tempfile::tempdir().unwrap();
    let observed = renter
        .download_to_disk(&manifest, dir.path().join("a"), DownloadMode::Blocking)
        .await
        .unwrap();
    let pending = renter
        .download_to_disk(&manifest, dir.path().join("b"), DownloadMode::Async)
        .await
        .unwrap();

    assert_eq!(renter.jobs().len(), 2);
    assert_eq!(renter.prune_jobs(), 1);
    assert!(renter.jobs().get(observed.id()).is_none());
    assert!(renter.jobs().get(pending.id()).is_some());

    pending.wait().await.unwrap();
    assert_eq!(renter.prune_jobs(), 1);
    assert!(renter.jobs().is_empty());
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    #[test]
    fn prop_download_inverts_upload(
        data in proptest::collection::vec(any::<u8>(), 0..4_096),
        data_pieces in 1usize..6,
        parity_pieces in 0usize..4,
        spare_hosts in 0usize..3,
    ) {
        let runtime = tokio::runtime::Runtime::new().unwrap();
        let downloaded = runtime.block_on(async {
            let network = MemoryHostNetwork::with_hosts(
                data_pieces + parity_pieces + spare_hosts,
                cheap_terms(),
            );
            let renter = renter(&network);
            let manifest = renter
                .upload_file_blocking(data.clone().into(), data_pieces, parity_pieces)
                .await
                .unwrap();
            renter.download_by_stream(&manifest).await.unwrap()
        });
        prop_assert_eq!(downloaded.to_vec(), data);
    }
}
