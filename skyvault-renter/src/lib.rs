//! SkyVault Renter
//!
//! Stores files across independent hosts and gets them back:
//! - `HostRegistry`: host selection and timeout-bounded host calls
//! - `UploadPipeline`: Reed-Solomon encode, one shard per host, spare-host
//!   substitution, early return at `d` stored shards
//! - `DownloadOrchestrator`: first `d` verified shards win, then decode
//! - Download jobs with a `Pending -> InProgress -> {Completed, Failed}`
//!   state machine
//!
//! Hosts are reached through the [`HostNetworkClient`] capability.

pub mod client;
pub mod config;
pub mod download;
pub mod error;
pub mod host;
pub mod jobs;
pub mod registry;
pub mod renter;
pub mod upload;

pub use client::{HostError, HostNetworkClient};
pub use config::RenterConfig;
pub use download::{DownloadMode, DownloadOrchestrator};
pub use error::{RenterError, Result};
pub use host::{Contract, ContractRequest, ContractTerms, Host};
pub use jobs::{DownloadHandle, DownloadReport, DownloadStatus, JobRegistry};
pub use registry::HostRegistry;
pub use renter::Renter;
pub use upload::{UploadHandle, UploadPipeline, UploadProgress, UploadStatus};
