// ABOUTME: Error types for migration steps.
// ABOUTME: MigrateErrorKind gives callers a stable taxonomy for logging and exit handling.

use crate::archive::ArchiveError;
use crate::compose::ComposeError;
use crate::inspect::InspectError;
use crate::runtime::{ContainerError, HelperError, NetworkError, VolumeError};
use std::path::PathBuf;

/// Errors that can occur during migration state transitions.
#[derive(Debug, thiserror::Error)]
pub enum MigrateError {
    /// Invalid input detected before any side effect.
    #[error("{0}")]
    Usage(String),

    /// Source container does not exist.
    #[error("container '{0}' not found")]
    NotFound(String),

    /// A stale archive is in the way; it was left untouched.
    #[error("archive already exists: {}", .0.display())]
    ArchiveExists(PathBuf),

    /// Reading or writing an artifact failed.
    #[error("archive I/O failed: {0}")]
    ArchiveIo(String),

    /// Committing the container filesystem failed.
    #[error("failed to commit container: {0}")]
    Commit(String),

    /// A remote command could not run or exited nonzero.
    #[error("remote command failed: {0}")]
    RemoteExecution(String),

    /// Moving the image or artifacts between hosts failed.
    #[error("transfer failed: {0}")]
    Transfer(String),

    /// Any other runtime fault (stop, start, volume, network, helper).
    #[error("runtime operation failed: {0}")]
    Runtime(String),

    /// The compose document could not be generated.
    #[error("compose generation failed: {0}")]
    Compose(#[from] ComposeError),

    /// The checkpoint could not be written or read back.
    #[error("checkpoint error: {0}")]
    Checkpoint(String),

    /// The operator declined at the confirmation gate.
    #[error("cancelled at confirmation; artifacts kept, resume with: ferry resume {}", .0.display())]
    Cancelled(PathBuf),
}

/// Error kind for programmatic handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MigrateErrorKind {
    Usage,
    NotFound,
    ArchiveExists,
    ArchiveIo,
    Commit,
    RemoteExecution,
    Transfer,
    Runtime,
    Compose,
    Checkpoint,
    Cancelled,
}

impl MigrateError {
    /// Returns the error kind for programmatic handling.
    pub fn kind(&self) -> MigrateErrorKind {
        match self {
            MigrateError::Usage(_) => MigrateErrorKind::Usage,
            MigrateError::NotFound(_) => MigrateErrorKind::NotFound,
            MigrateError::ArchiveExists(_) => MigrateErrorKind::ArchiveExists,
            MigrateError::ArchiveIo(_) => MigrateErrorKind::ArchiveIo,
            MigrateError::Commit(_) => MigrateErrorKind::Commit,
            MigrateError::RemoteExecution(_) => MigrateErrorKind::RemoteExecution,
            MigrateError::Transfer(_) => MigrateErrorKind::Transfer,
            MigrateError::Runtime(_) => MigrateErrorKind::Runtime,
            MigrateError::Compose(_) => MigrateErrorKind::Compose,
            MigrateError::Checkpoint(_) => MigrateErrorKind::Checkpoint,
            MigrateError::Cancelled(_) => MigrateErrorKind::Cancelled,
        }
    }
}

impl From<ArchiveError> for MigrateError {
    fn from(err: ArchiveError) -> Self {
        match err {
            ArchiveError::Exists(path) => MigrateError::ArchiveExists(path),
            other => MigrateError::ArchiveIo(other.to_string()),
        }
    }
}

impl From<InspectError> for MigrateError {
    fn from(err: InspectError) -> Self {
        match err {
            InspectError::NotFound(name) => MigrateError::NotFound(name),
            other => MigrateError::Runtime(other.to_string()),
        }
    }
}

impl From<ContainerError> for MigrateError {
    fn from(err: ContainerError) -> Self {
        match err {
            ContainerError::NotFound(name) => MigrateError::NotFound(name),
            ContainerError::CommitFailed(msg) => MigrateError::Commit(msg),
            other => MigrateError::Runtime(other.to_string()),
        }
    }
}

impl From<VolumeError> for MigrateError {
    fn from(err: VolumeError) -> Self {
        MigrateError::Runtime(err.to_string())
    }
}

impl From<NetworkError> for MigrateError {
    fn from(err: NetworkError) -> Self {
        MigrateError::Runtime(err.to_string())
    }
}

impl From<HelperError> for MigrateError {
    fn from(err: HelperError) -> Self {
        MigrateError::Runtime(err.to_string())
    }
}
