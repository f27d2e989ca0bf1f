// ABOUTME: Staging directory layout on both hosts.
// ABOUTME: Fixes artifact names for a run and resolves them to local and remote paths.

use crate::types::ContainerName;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Path of the staging directory inside helper containers.
pub const HELPER_STAGING: &str = "/ferry/staging";
/// Path of the ferry binary inside the source-side helper.
pub const HELPER_BINARY: &str = "/ferry/bin/ferry";
/// File name of the ferry binary in remote staging.
pub const REMOTE_BINARY_NAME: &str = "ferry";

/// Where a run keeps its artifacts on each host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StagingLayout {
    pub local_dir: PathBuf,
    pub remote_dir: String,
    pub archive: String,
    pub compose: String,
    pub volume_list: String,
    pub checkpoint: String,
}

impl StagingLayout {
    pub fn new(container: &ContainerName, local_dir: PathBuf, remote_dir: String) -> Self {
        Self {
            local_dir,
            remote_dir,
            archive: container.archive_file(),
            compose: container.compose_file(),
            volume_list: container.volume_list_file(),
            checkpoint: container.checkpoint_file(),
        }
    }

    pub fn local_archive(&self) -> PathBuf {
        self.local_dir.join(&self.archive)
    }

    pub fn local_compose(&self) -> PathBuf {
        self.local_dir.join(&self.compose)
    }

    pub fn local_volume_list(&self) -> PathBuf {
        self.local_dir.join(&self.volume_list)
    }

    pub fn local_checkpoint(&self) -> PathBuf {
        self.local_dir.join(&self.checkpoint)
    }

    pub fn remote_archive(&self) -> String {
        remote_join(&self.remote_dir, &self.archive)
    }

    pub fn remote_compose(&self) -> String {
        remote_join(&self.remote_dir, &self.compose)
    }

    pub fn remote_binary(&self) -> String {
        remote_join(&self.remote_dir, REMOTE_BINARY_NAME)
    }

    /// `name` as seen from inside a helper that mounts staging at [`HELPER_STAGING`].
    pub fn in_helper(name: &str) -> String {
        remote_join(HELPER_STAGING, name)
    }

    pub fn local_dir(&self) -> &Path {
        &self.local_dir
    }
}

fn remote_join(dir: &str, name: &str) -> String {
    format!("{}/{}", dir.trim_end_matches('/'), name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn artifact_names_follow_container() {
        let name = ContainerName::new("web").unwrap();
        let layout = StagingLayout::new(&name, PathBuf::from("/tmp/stage"), "/tmp/ferry.Ab12/".into());
        assert_eq!(layout.local_archive(), PathBuf::from("/tmp/stage/web-volumes.tar.gz"));
        assert_eq!(layout.local_compose(), PathBuf::from("/tmp/stage/web.compose.yml"));
        assert_eq!(layout.remote_archive(), "/tmp/ferry.Ab12/web-volumes.tar.gz");
        assert_eq!(layout.remote_binary(), "/tmp/ferry.Ab12/ferry");
        assert_eq!(StagingLayout::in_helper("web-volumes.list"), "/ferry/staging/web-volumes.list");
    }
}
