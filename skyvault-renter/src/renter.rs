//! Renter facade binding registry, upload pipeline and downloads together

use crate::client::HostNetworkClient;
use crate::config::RenterConfig;
use crate::download::{DownloadMode, DownloadOrchestrator};
use crate::error::Result;
use crate::host::Host;
use crate::jobs::{DownloadHandle, DownloadReport, JobRegistry};
use crate::registry::HostRegistry;
use crate::upload::{UploadHandle, UploadPipeline};
use bytes::Bytes;
use skyvault_core::FileManifest;
use std::path::PathBuf;
use std::sync::Arc;
use uuid::Uuid;

/// Storage client for one node
pub struct Renter {
    id: Uuid,
    registry: Arc<HostRegistry>,
    uploads: UploadPipeline,
    downloads: Arc<DownloadOrchestrator>,
    jobs: JobRegistry,
}

impl Renter {
    pub fn new(client: Arc<dyn HostNetworkClient>, config: RenterConfig) -> Result<Self> {
        config.validate()?;
        let id = Uuid::new_v4();
        let jobs = JobRegistry::new(config.job_retention());
        let registry = Arc::new(HostRegistry::new(client, config, id));

        Ok(Self {
            id,
            uploads: UploadPipeline::new(registry.clone()),
            downloads: Arc::new(DownloadOrchestrator::new(registry.clone())),
            registry,
            jobs,
        })
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn config(&self) -> &RenterConfig {
        self.registry.config()
    }

    pub fn jobs(&self) -> &JobRegistry {
        &self.jobs
    }

    pub async fn contractable_hosts(&self) -> Result<Vec<Host>> {
        self.registry.contractable_hosts().await
    }

    /// Upload, returning once `data_pieces` shards are stored
    pub async fn upload_file(
        &self,
        data: Bytes,
        data_pieces: usize,
        parity_pieces: usize,
    ) -> Result<UploadHandle> {
        self.uploads
            .upload_file(data, data_pieces, parity_pieces)
            .await
    }

    /// Upload and wait for every placement to settle
    pub async fn upload_file_blocking(
        &self,
        data: Bytes,
        data_pieces: usize,
        parity_pieces: usize,
    ) -> Result<FileManifest> {
        self.uploads
            .upload_file_blocking(data, data_pieces, parity_pieces)
            .await
    }

    pub async fn download_by_stream(&self, manifest: &FileManifest) -> Result<Bytes> {
        self.downloads.download_by_stream(manifest).await
    }

    /// Download to `destination`.
    ///
    /// In `Blocking` mode the file is written before this returns and
    /// failures are returned directly. In `Async` mode the handle comes back
    /// while the job is still `Pending`.
    pub async fn download_to_disk(
        &self,
        manifest: &FileManifest,
        destination: impl Into<PathBuf>,
        mode: DownloadMode,
    ) -> Result<DownloadHandle> {
        let handle = DownloadHandle::spawn(
            self.downloads.clone(),
            manifest.clone(),
            destination.into(),
        );
        self.jobs.insert(handle.clone());

        if mode == DownloadMode::Blocking {
            handle.wait().await?;
        }
        Ok(handle)
    }

    pub async fn wait_for_download(&self, job_id: Uuid) -> Result<DownloadReport> {
        self.jobs.wait(job_id).await
    }

    pub fn cancel_download(&self, job_id: Uuid) -> Result<()> {
        self.jobs.cancel(job_id)
    }

    /// Drop finished jobs per the retention policy
    pub fn prune_jobs(&self) -> usize {
        self.jobs.prune()
    }
}
