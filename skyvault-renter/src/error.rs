//! Renter error types

use skyvault_core::VaultError;
use thiserror::Error;
use uuid::Uuid;

/// Renter errors
///
/// Every fatal condition is its own variant so callers can tell a thin host
/// pool apart from a failed reconstruction or a cancelled job. Stored job
/// outcomes are cloned to every waiter, hence `Clone`.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RenterError {
    #[error("Insufficient hosts: {available} contractable, {required} required")]
    InsufficientHosts { available: usize, required: usize },

    #[error("Insufficient redundancy: {accepted} shards placed, {required} required")]
    InsufficientRedundancy { accepted: usize, required: usize },

    #[error("Reconstruction failed: {received} valid shards received, {required} required")]
    ReconstructionFailed { received: usize, required: usize },

    #[error("Operation cancelled")]
    Cancelled,

    #[error("Invalid parameters: {0}")]
    InvalidParameters(String),

    #[error("Host network error: {0}")]
    HostNetwork(String),

    #[error("Download job not found: {0}")]
    JobNotFound(Uuid),

    #[error("I/O error: {0}")]
    Io(String),

    #[error("Core error: {0}")]
    Core(String),
}

impl From<VaultError> for RenterError {
    fn from(err: VaultError) -> Self {
        match err {
            VaultError::InsufficientShards {
                available,
                required,
            } => RenterError::ReconstructionFailed {
                received: available,
                required,
            },
            VaultError::Io(e) => RenterError::Io(e.to_string()),
            other => RenterError::Core(other.to_string()),
        }
    }
}

impl From<std::io::Error> for RenterError {
    fn from(err: std::io::Error) -> Self {
        RenterError::Io(err.to_string())
    }
}

/// Result type alias for renter operations
pub type Result<T> = std::result::Result<T, RenterError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vault_error_conversion() {
        let err: RenterError = VaultError::InsufficientShards {
            available: 2,
            required: 3,
        }
        .into();
        assert_eq!(
            err,
            RenterError::ReconstructionFailed {
                received: 2,
                required: 3
            }
        );

        let err: RenterError = VaultError::InvalidHostId("bad".into()).into();
        assert!(matches!(err, RenterError::Core(_)));
    }
}
