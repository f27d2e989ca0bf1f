// ABOUTME: Shared types used across runtime trait definitions.
// ABOUTME: ContainerDetails, MountInfo, NetworkConfig, HelperSpec, ImageStream, etc.

use super::image::ImageError;
use crate::types::{ContainerId, ImageRef};
use bytes::Bytes;
use futures::Stream;
use std::collections::HashMap;
use std::pin::Pin;

/// Byte stream of a saved image archive.
pub type ImageStream = Pin<Box<dyn Stream<Item = Result<Bytes, ImageError>> + Send>>;

/// Inspection result for a container.
#[derive(Debug, Clone)]
pub struct ContainerDetails {
    /// Full container ID.
    pub id: ContainerId,
    /// Container name without the leading slash.
    pub name: String,
    /// Image reference from the container's configuration.
    pub image: String,
    /// Current state.
    pub state: ContainerState,
    /// Mounts in the order the runtime reports them.
    pub mounts: Vec<MountInfo>,
    /// Names of attached networks.
    pub networks: Vec<String>,
    /// Host config network mode (`bridge`, `host`, `none`, `container:<id>`, or a network name).
    pub network_mode: Option<String>,
    /// The complete inspect document as returned by the runtime API.
    pub raw: serde_json::Value,
}

/// Container state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContainerState {
    Created,
    Running,
    Paused,
    Restarting,
    Removing,
    Exited,
    Dead,
}

/// Kind of a container mount.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MountKind {
    /// Runtime-managed named volume.
    Volume,
    /// Host path bind mount.
    Bind,
    /// In-memory filesystem.
    Tmpfs,
    /// Anything else the runtime reports (image, npipe, cluster).
    Other,
}

/// A single mount of a container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MountInfo {
    pub kind: MountKind,
    /// Volume name for `Volume` mounts.
    pub name: Option<String>,
    /// Host path or volume mountpoint.
    pub source: Option<String>,
    /// Path inside the container.
    pub destination: String,
    pub read_only: bool,
}

/// Configuration for creating a network.
#[derive(Debug, Clone)]
pub struct NetworkConfig {
    /// Network name.
    pub name: String,
    /// Network driver (bridge, overlay, etc.).
    pub driver: Option<String>,
    /// Labels.
    pub labels: HashMap<String, String>,
}

impl NetworkConfig {
    /// Bridge network with the given name and no labels.
    pub fn bridge(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            driver: Some("bridge".to_string()),
            labels: HashMap::new(),
        }
    }
}

/// A bind mount handed to a helper container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BindMount {
    /// Path on the runtime's host.
    pub host_path: String,
    /// Path inside the helper.
    pub container_path: String,
    pub read_only: bool,
}

impl BindMount {
    /// Docker `host:container[:ro]` bind syntax.
    pub fn to_bind_string(&self) -> String {
        if self.read_only {
            format!("{}:{}:ro", self.host_path, self.container_path)
        } else {
            format!("{}:{}", self.host_path, self.container_path)
        }
    }
}

/// A throwaway container that borrows another container's volumes.
#[derive(Debug, Clone)]
pub struct HelperSpec {
    /// Base image for the helper.
    pub image: ImageRef,
    /// Containers whose volumes are mounted at their original destinations.
    pub volumes_from: Vec<ContainerId>,
    /// Extra bind mounts.
    pub binds: Vec<BindMount>,
    /// Executable run as the entrypoint.
    pub entrypoint: String,
    /// Arguments passed to the entrypoint.
    pub args: Vec<String>,
}

/// How a helper container finished.
#[derive(Debug, Clone)]
pub struct HelperOutcome {
    /// Process exit code.
    pub exit_code: i64,
    /// Combined stdout and stderr.
    pub output: String,
    /// Set when the helper could not be removed afterwards.
    pub cleanup_error: Option<String>,
}

impl HelperOutcome {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

/// Runtime metadata.
#[derive(Debug, Clone)]
pub struct RuntimeMetadata {
    /// Runtime name (e.g., "Docker", "Podman").
    pub name: String,
    /// Runtime version.
    pub version: String,
    /// API version.
    pub api_version: String,
    /// Operating system.
    pub os: String,
    /// Architecture.
    pub arch: String,
}
