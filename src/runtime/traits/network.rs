// ABOUTME: Network operations trait for container runtimes.
// ABOUTME: Check for and create networks.

use super::sealed::Sealed;
use super::shared_types::NetworkConfig;
use crate::types::NetworkId;
use async_trait::async_trait;

/// Network operations: existence check and creation.
#[async_trait]
pub trait NetworkOps: Sealed + Send + Sync {
    /// Create a network.
    async fn create_network(&self, config: &NetworkConfig) -> Result<NetworkId, NetworkError>;

    /// Check if a network exists.
    async fn network_exists(&self, name: &str) -> Result<bool, NetworkError>;
}

/// Errors from network operations.
#[derive(Debug, thiserror::Error)]
pub enum NetworkError {
    #[error("network already exists: {0}")]
    AlreadyExists(String),

    #[error("runtime error: {0}")]
    Runtime(String),
}
