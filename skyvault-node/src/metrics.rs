//! Prometheus metrics for SkyVault nodes
//!
//! The library crates record against the names in
//! [`skyvault_core::metric_names`]; this module describes them and installs
//! the exporter.

use metrics::{describe_counter, describe_histogram, Unit};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use tracing::info;

pub use skyvault_core::metric_names as names;

/// Initialize metric descriptions
pub fn init_metrics() {
    // Mining
    describe_counter!(names::BLOCKS_MINED, "Blocks mined and accepted by the chain");
    describe_counter!(
        names::STALE_SUBMISSIONS,
        "Solved headers submitted after the tip moved"
    );
    describe_counter!(
        names::NONCE_BATCHES_EXHAUSTED,
        "Nonce batches searched without a solution"
    );
    describe_counter!(names::MINING_ERRORS, "Mining attempts that failed");

    // Upload
    describe_counter!(names::SHARDS_PLACED, "Shards stored on hosts");
    describe_counter!(
        names::PLACEMENT_FAILURES,
        "Shard placements that failed on a host"
    );
    describe_counter!(
        names::CONTRACTS_RELEASED,
        "Contracts released after a failed or abandoned placement"
    );
    describe_histogram!(
        names::UPLOAD_DURATION,
        Unit::Seconds,
        "Time until an upload reached its data piece threshold"
    );

    // Download
    describe_counter!(
        names::SHARD_FETCH_FAILURES,
        "Shard fetches that failed, timed out or failed verification"
    );
    describe_counter!(names::DOWNLOADS_COMPLETED, "Files reconstructed");
    describe_counter!(names::DOWNLOADS_FAILED, "Downloads that did not complete");
    describe_histogram!(
        names::DOWNLOAD_DURATION,
        Unit::Seconds,
        "Time to fetch and decode a file"
    );
}

/// Install the Prometheus recorder with an HTTP listener on `port`
pub fn install_exporter(port: u16) -> anyhow::Result<SocketAddr> {
    let addr: SocketAddr = format!("0.0.0.0:{}", port).parse()?;
    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()?;
    info!(addr = %addr, "Metrics exporter listening");
    Ok(addr)
}
