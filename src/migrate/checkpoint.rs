// ABOUTME: Confirmation checkpoint: everything needed to finish a migration later.
// ABOUTME: Written as JSON into local staging; its path is the resume token.

use super::error::MigrateError;
use super::layout::StagingLayout;
use super::state::ContainerSnapshot;
use crate::config::RunConfig;
use crate::types::ContainerId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;

pub const CHECKPOINT_VERSION: u32 = 1;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Checkpoint {
    pub version: u32,
    pub created_at: DateTime<Utc>,
    /// Host that wrote the checkpoint; local staging paths are only valid there.
    pub origin_host: String,
    pub config: RunConfig,
    pub layout: StagingLayout,
    pub source: ContainerId,
    pub snapshot: ContainerSnapshot,
}

impl Checkpoint {
    pub fn new(
        config: RunConfig,
        layout: StagingLayout,
        source: ContainerId,
        snapshot: ContainerSnapshot,
    ) -> Self {
        Self {
            version: CHECKPOINT_VERSION,
            created_at: Utc::now(),
            origin_host: local_hostname(),
            config,
            layout,
            source,
            snapshot,
        }
    }

    /// Write to `path`, replacing any previous checkpoint atomically.
    pub fn write(&self, path: &Path) -> Result<(), MigrateError> {
        let json = serde_json::to_vec_pretty(self)
            .map_err(|e| MigrateError::Checkpoint(format!("encode: {e}")))?;
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, json)
            .and_then(|()| std::fs::rename(&tmp, path))
            .map_err(|e| MigrateError::Checkpoint(format!("{}: {e}", path.display())))
    }

    /// Read a checkpoint and check it can be resumed on this host.
    pub fn load(path: &Path) -> Result<Self, MigrateError> {
        let bytes = std::fs::read(path)
            .map_err(|e| MigrateError::Checkpoint(format!("{}: {e}", path.display())))?;
        let checkpoint: Checkpoint = serde_json::from_slice(&bytes)
            .map_err(|e| MigrateError::Checkpoint(format!("{}: {e}", path.display())))?;

        if checkpoint.version != CHECKPOINT_VERSION {
            return Err(MigrateError::Checkpoint(format!(
                "unsupported checkpoint version {} (expected {})",
                checkpoint.version, CHECKPOINT_VERSION
            )));
        }
        let here = local_hostname();
        if checkpoint.origin_host != here {
            return Err(MigrateError::Checkpoint(format!(
                "checkpoint was written on '{}', this is '{}'",
                checkpoint.origin_host, here
            )));
        }
        if !checkpoint.layout.local_dir.is_dir() {
            return Err(MigrateError::Checkpoint(format!(
                "staging directory {} is gone",
                checkpoint.layout.local_dir.display()
            )));
        }
        Ok(checkpoint)
    }
}

fn local_hostname() -> String {
    gethostname::gethostname().to_string_lossy().into_owned()
}
