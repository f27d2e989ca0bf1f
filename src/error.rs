// ABOUTME: Application-wide error types for ferry.
// ABOUTME: Uses thiserror for ergonomic error handling; maps errors to process exit codes.

use crate::archive::ArchiveError;
use crate::migrate::{MigrateErrorKind, StepFailure};
use crate::runtime::RuntimeError;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("{0}")]
    Usage(String),

    #[error("configuration file not found: {0}")]
    ConfigNotFound(PathBuf),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("SSH error: {0}")]
    Ssh(#[from] crate::ssh::Error),

    #[error(transparent)]
    Runtime(#[from] RuntimeError),

    #[error(transparent)]
    Archive(#[from] ArchiveError),

    #[error(transparent)]
    Migration(#[from] StepFailure),
}

impl Error {
    /// Process exit code for this error.
    pub fn exit_code(&self) -> i32 {
        match self {
            Error::Archive(e) => e.exit_code(),
            _ => 1,
        }
    }

    /// Kind of the failed migration step, if this is one.
    pub fn migration_kind(&self) -> Option<MigrateErrorKind> {
        match self {
            Error::Migration(failure) => Some(failure.kind()),
            _ => None,
        }
    }

    /// Emit this error as a structured event before the process exits.
    pub fn log(&self) {
        if let Some(kind) = self.migration_kind() {
            tracing::error!(?kind, exit_code = self.exit_code(), error = %self, "migration failed");
            return;
        }
        match self {
            Error::Runtime(e) => {
                tracing::error!(host = e.host(), kind = ?e.kind(), error = %e, "container runtime unavailable")
            }
            _ => tracing::error!(exit_code = self.exit_code(), error = %self, "ferry failed"),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
