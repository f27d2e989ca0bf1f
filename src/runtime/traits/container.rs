// ABOUTME: Container operations trait for container runtimes.
// ABOUTME: Inspect, stop, start and commit containers.

use super::sealed::Sealed;
use super::shared_types::ContainerDetails;
use crate::types::{ContainerId, ImageId, ImageRef};
use async_trait::async_trait;
use std::time::Duration;

/// Container lifecycle operations.
#[async_trait]
pub trait ContainerOps: Sealed + Send + Sync {
    /// Get detailed information about a container by name or ID.
    async fn inspect_container(&self, id: &ContainerId)
    -> Result<ContainerDetails, ContainerError>;

    /// Stop a running container.
    async fn stop_container(
        &self,
        id: &ContainerId,
        timeout: Duration,
    ) -> Result<(), ContainerError>;

    /// Start a created or stopped container.
    async fn start_container(&self, id: &ContainerId) -> Result<(), ContainerError>;

    /// Commit the container's filesystem to a new image under `target`.
    async fn commit_container(
        &self,
        id: &ContainerId,
        target: &ImageRef,
    ) -> Result<ImageId, ContainerError>;
}

/// Errors from container operations.
#[derive(Debug, thiserror::Error)]
pub enum ContainerError {
    #[error("container not found: {0}")]
    NotFound(String),

    #[error("container not running: {0}")]
    NotRunning(String),

    #[error("container already running: {0}")]
    AlreadyRunning(String),

    #[error("commit failed: {0}")]
    CommitFailed(String),

    #[error("runtime error: {0}")]
    Runtime(String),
}
