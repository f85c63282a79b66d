//! Metric names shared by the library crates
//!
//! Descriptions are registered by the node binary.

// Mining
pub const BLOCKS_MINED: &str = "skyvault_blocks_mined_total";
pub const STALE_SUBMISSIONS: &str = "skyvault_stale_submissions_total";
pub const NONCE_BATCHES_EXHAUSTED: &str = "skyvault_nonce_batches_exhausted_total";
pub const MINING_ERRORS: &str = "skyvault_mining_errors_total";

// Upload
pub const SHARDS_PLACED: &str = "skyvault_shards_placed_total";
pub const PLACEMENT_FAILURES: &str = "skyvault_placement_failures_total";
pub const CONTRACTS_RELEASED: &str = "skyvault_contracts_released_total";
pub const UPLOAD_DURATION: &str = "skyvault_upload_duration_seconds";

// Download
pub const SHARD_FETCH_FAILURES: &str = "skyvault_shard_fetch_failures_total";
pub const DOWNLOADS_COMPLETED: &str = "skyvault_downloads_completed_total";
pub const DOWNLOADS_FAILED: &str = "skyvault_downloads_failed_total";
pub const DOWNLOAD_DURATION: &str = "skyvault_download_duration_seconds";
