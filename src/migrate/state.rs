// ABOUTME: Migration state types for the type state pattern.
// ABOUTME: Each state carries exactly the data the next step needs.

use crate::inspect::{NetworkSet, VolumeSet};
use crate::types::{ContainerId, ImageId, ImageRef};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// What was captured from the source container. Never mutated once built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContainerSnapshot {
    /// Image the container filesystem was committed to.
    pub image: ImageRef,
    pub image_id: ImageId,
    /// Full inspect document of the source container.
    pub metadata: serde_json::Value,
    pub volumes: VolumeSet,
    pub networks: NetworkSet,
}

/// Source container plus its snapshot; carried through the local half.
#[derive(Debug, Clone)]
pub struct Captured {
    pub source: ContainerId,
    pub snapshot: ContainerSnapshot,
}

/// Initial state: staging directories exist on both hosts.
/// Available actions: `stop()`
#[derive(Debug, Clone, Copy, Default)]
pub struct Initialized;

/// Source container stopped.
/// Available actions: `snapshot()`
#[derive(Debug, Clone)]
pub struct Stopped {
    pub(crate) source: ContainerId,
}

/// Container committed to an image and inspected.
/// Available actions: `transfer_image()`
#[derive(Debug, Clone)]
pub struct Snapshotted(pub(crate) Captured);

/// Image loaded on the remote runtime.
/// Available actions: `export_config()`
#[derive(Debug, Clone)]
pub struct ImageTransferred(pub(crate) Captured);

/// Compose document written to local staging.
/// Available actions: `export_volumes()`
#[derive(Debug, Clone)]
pub struct ConfigExported(pub(crate) Captured);

/// Volume archive written to local staging.
/// Available actions: `checkpoint()`
#[derive(Debug, Clone)]
pub struct VolumesExported(pub(crate) Captured);

/// Checkpoint written; waiting on the operator.
/// Available actions: `confirm()`
#[derive(Debug, Clone)]
pub struct AwaitingConfirmation {
    pub(crate) captured: Captured,
    pub(crate) checkpoint: PathBuf,
}

/// Operator approved, or the run was resumed from a checkpoint.
/// Available actions: `transfer_artifacts()`
#[derive(Debug, Clone)]
pub struct Confirmed(pub(crate) Captured);

/// Archive, compose document and helper binary are in remote staging.
/// Available actions: `provision()`
#[derive(Debug, Clone)]
pub struct ArtifactsTransferred(pub(crate) Captured);

/// What provisioning created and what already existed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProvisionReport {
    pub created_volumes: Vec<String>,
    pub existing_volumes: Vec<String>,
    pub created_networks: Vec<String>,
    pub existing_networks: Vec<String>,
}

impl ProvisionReport {
    pub fn created_anything(&self) -> bool {
        !self.created_volumes.is_empty() || !self.created_networks.is_empty()
    }
}

/// Volumes and networks exist on the remote runtime.
/// Available actions: `recreate()`
#[derive(Debug, Clone)]
pub struct Provisioned {
    pub(crate) captured: Captured,
    pub(crate) report: ProvisionReport,
}

/// Remote container created, stopped, volumes still empty.
/// Available actions: `import_volumes()`
#[derive(Debug, Clone)]
pub struct Recreated {
    pub(crate) captured: Captured,
    pub(crate) remote_container: ContainerId,
}

/// Volume contents restored into the remote container's volumes.
/// Available actions: `start()`
#[derive(Debug, Clone)]
pub struct VolumesImported {
    pub(crate) remote_container: ContainerId,
}

/// Remote container running.
#[derive(Debug, Clone)]
pub struct Completed {
    pub(crate) remote_container: ContainerId,
}

/// Pipeline steps, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Step {
    Initializing,
    Stopping,
    Snapshotting,
    TransferringImage,
    ExportingConfig,
    ExportingVolumes,
    Confirmation,
    TransferringArtifacts,
    Provisioning,
    Recreating,
    ImportingVolumes,
    StartingRemote,
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Step::Initializing => "initializing",
            Step::Stopping => "stopping container",
            Step::Snapshotting => "snapshotting",
            Step::TransferringImage => "transferring image",
            Step::ExportingConfig => "exporting config",
            Step::ExportingVolumes => "exporting volumes",
            Step::Confirmation => "confirmation",
            Step::TransferringArtifacts => "transferring artifacts",
            Step::Provisioning => "provisioning remote resources",
            Step::Recreating => "recreating container",
            Step::ImportingVolumes => "importing volumes",
            Step::StartingRemote => "starting remote container",
        };
        f.write_str(s)
    }
}
