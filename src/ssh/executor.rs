// ABOUTME: Remote command execution seam used by the migration pipeline.
// ABOUTME: Session implements it; tests substitute an in-memory fake.

use super::client::{CommandOutput, Session};
use super::error::Result;
use async_trait::async_trait;
use std::path::Path;

/// Runs shell commands and copies files on the destination host.
#[async_trait]
pub trait RemoteExecutor: Send + Sync {
    /// Run a shell command and collect its output.
    async fn run(&self, command: &str) -> Result<CommandOutput>;

    /// Copy a local file to an absolute path on the remote host.
    async fn copy_file(&self, local: &Path, remote_path: &str) -> Result<()>;
}

#[async_trait]
impl RemoteExecutor for Session {
    async fn run(&self, command: &str) -> Result<CommandOutput> {
        tracing::debug!(host = %self.host(), command, "remote exec");
        self.exec(command).await
    }

    async fn copy_file(&self, local: &Path, remote_path: &str) -> Result<()> {
        tracing::debug!(host = %self.host(), local = %local.display(), remote_path, "remote copy");
        Session::copy_file(self, local, remote_path).await
    }
}

/// Quote a string for a POSIX shell using single quotes.
pub fn shell_quote(s: &str) -> String {
    format!("'{}'", s.replace('\'', r"'\''"))
}
