// ABOUTME: Volume operations trait for container runtimes.
// ABOUTME: Check for and create named volumes.

use super::sealed::Sealed;
use async_trait::async_trait;

/// Named volume operations.
#[async_trait]
pub trait VolumeOps: Sealed + Send + Sync {
    /// Check if a volume exists.
    async fn volume_exists(&self, name: &str) -> Result<bool, VolumeError>;

    /// Create an empty volume with the default driver.
    async fn create_volume(&self, name: &str) -> Result<(), VolumeError>;
}

/// Errors from volume operations.
#[derive(Debug, thiserror::Error)]
pub enum VolumeError {
    #[error("volume already exists: {0}")]
    AlreadyExists(String),

    #[error("runtime error: {0}")]
    Runtime(String),
}
