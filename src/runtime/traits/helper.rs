// ABOUTME: Helper container trait for container runtimes.
// ABOUTME: Runs a throwaway container to completion and removes it.

use super::sealed::Sealed;
use super::shared_types::{HelperOutcome, HelperSpec};
use async_trait::async_trait;

/// Throwaway helper containers.
#[async_trait]
pub trait HelperOps: Sealed + Send + Sync {
    /// Create, start, and wait for a helper, then remove it.
    ///
    /// A nonzero exit is reported in the outcome, not as an error. Errors
    /// mean the helper could not be run at all.
    async fn run_helper(&self, spec: &HelperSpec) -> Result<HelperOutcome, HelperError>;
}

/// Errors from helper containers.
#[derive(Debug, thiserror::Error)]
pub enum HelperError {
    #[error("helper image not found: {0}")]
    ImageNotFound(String),

    #[error("failed to create helper: {0}")]
    CreateFailed(String),

    #[error("failed to start helper: {0}")]
    StartFailed(String),

    #[error("failed waiting for helper: {0}")]
    WaitFailed(String),
}
