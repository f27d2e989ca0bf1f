// ABOUTME: In-memory runtime and remote shell doubles for pipeline tests.
// ABOUTME: Every call is appended to a shared journal so tests can assert on ordering.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use futures::{StreamExt, TryStreamExt};
use parking_lot::Mutex;
use serde_json::json;

use crate::archive;
use crate::runtime::traits::sealed::Sealed;
use crate::runtime::{
    ContainerDetails, ContainerError, ContainerOps, ContainerState, HelperError, HelperOps,
    HelperOutcome, HelperSpec, ImageError, ImageOps, ImageStream, MountInfo, MountKind,
    NetworkConfig, NetworkError, NetworkOps, RuntimeInfo, RuntimeInfoError, RuntimeMetadata,
    VolumeError, VolumeOps,
};
use crate::ssh::{self, CommandOutput, RemoteExecutor};
use crate::types::{ContainerId, ImageId, ImageRef, NetworkId};

use super::gate::{ConfirmationGate, ConfirmationSummary, GateDecision};
use super::layout::HELPER_STAGING;

pub const REMOTE_STAGING: &str = "/tmp/ferry.test01";

/// Ordered record of calls across every fake sharing it.
#[derive(Debug, Clone, Default)]
pub struct Journal(Arc<Mutex<Vec<String>>>);

impl Journal {
    pub fn record(&self, event: impl Into<String>) {
        self.0.lock().push(event.into());
    }

    pub fn events(&self) -> Vec<String> {
        self.0.lock().clone()
    }

    pub fn position(&self, event: &str) -> Option<usize> {
        self.0.lock().iter().position(|e| e == event)
    }
}

#[derive(Debug, Clone)]
struct FakeContainer {
    id: String,
    image: String,
    running: bool,
    mounts: Vec<MountInfo>,
    networks: Vec<String>,
    raw: serde_json::Value,
}

#[derive(Debug, Default)]
struct FakeState {
    containers: HashMap<String, FakeContainer>,
    images: BTreeSet<String>,
    volumes: BTreeSet<String>,
    networks: BTreeSet<String>,
    fail_commit: bool,
    fail_load: bool,
    helper_exit: Option<i64>,
}

/// Container runtime held in memory.
#[derive(Debug)]
pub struct FakeRuntime {
    label: &'static str,
    journal: Journal,
    state: Mutex<FakeState>,
}

impl Sealed for FakeRuntime {}

impl FakeRuntime {
    pub fn new(label: &'static str, journal: Journal) -> Self {
        Self {
            label,
            journal,
            state: Mutex::new(FakeState::default()),
        }
    }

    fn record(&self, event: impl AsRef<str>) {
        self.journal.record(format!("{}: {}", self.label, event.as_ref()));
    }

    pub fn with_image(self, image: &str) -> Self {
        self.state.lock().images.insert(image.to_string());
        self
    }

    pub fn with_volume(self, name: &str) -> Self {
        self.state.lock().volumes.insert(name.to_string());
        self
    }

    pub fn with_network(self, name: &str) -> Self {
        self.state.lock().networks.insert(name.to_string());
        self
    }

    pub fn failing_commit(self) -> Self {
        self.state.lock().fail_commit = true;
        self
    }

    /// Make every later `load_image` fail after draining the stream.
    pub fn set_failing_load(&self) {
        self.state.lock().fail_load = true;
    }

    /// Make the export helper exit with `code` without writing an archive.
    pub fn set_helper_exit(&self, code: i64) {
        self.state.lock().helper_exit = Some(code);
    }

    /// Add a running container with named volumes `(name, destination)`
    /// and the given attached networks.
    pub fn with_container(self, name: &str, image: &str, volumes: &[(&str, &str)], networks: &[&str]) -> Self {
        let id = format!("{name}0123456789abcdef");
        let mounts: Vec<MountInfo> = volumes
            .iter()
            .map(|(volume, destination)| MountInfo {
                kind: MountKind::Volume,
                name: Some(volume.to_string()),
                source: Some(format!("/var/lib/docker/volumes/{volume}/_data")),
                destination: destination.to_string(),
                read_only: false,
            })
            .collect();
        let network_map: serde_json::Map<String, serde_json::Value> = networks
            .iter()
            .map(|n| (n.to_string(), json!({})))
            .collect();
        let raw = json!({
            "Id": id,
            "Name": format!("/{name}"),
            "Config": {
                "Hostname": &id[..12],
                "Image": image,
                "Env": ["PATH=/usr/local/bin:/usr/bin:/bin"],
            },
            "HostConfig": {
                "NetworkMode": networks.first().copied().unwrap_or("bridge"),
                "RestartPolicy": { "Name": "unless-stopped", "MaximumRetryCount": 0 },
            },
            "Mounts": volumes.iter().map(|(volume, destination)| json!({
                "Type": "volume",
                "Name": volume,
                "Destination": destination,
                "RW": true,
            })).collect::<Vec<_>>(),
            "NetworkSettings": { "Networks": network_map },
        });
        let container = FakeContainer {
            id,
            image: image.to_string(),
            running: true,
            mounts,
            networks: networks.iter().map(|n| n.to_string()).collect(),
            raw,
        };
        self.state.lock().containers.insert(name.to_string(), container);
        self
    }

    /// Create a stopped container, as `compose create` would.
    pub fn create_container(&self, name: &str, image: &str, volumes: &[(String, String)]) {
        let mounts = volumes
            .iter()
            .map(|(volume, destination)| MountInfo {
                kind: MountKind::Volume,
                name: Some(volume.clone()),
                source: None,
                destination: destination.clone(),
                read_only: false,
            })
            .collect();
        let container = FakeContainer {
            id: format!("{name}fedcba9876543210"),
            image: image.to_string(),
            running: false,
            mounts,
            networks: Vec::new(),
            raw: json!({ "Id": format!("{name}fedcba9876543210") }),
        };
        self.state.lock().containers.insert(name.to_string(), container);
    }

    pub fn is_running(&self, name: &str) -> bool {
        self.state
            .lock()
            .containers
            .get(name)
            .is_some_and(|c| c.running)
    }

    pub fn has_image(&self, image: &str) -> bool {
        self.state.lock().images.contains(image)
    }

    pub fn volumes(&self) -> Vec<String> {
        self.state.lock().volumes.iter().cloned().collect()
    }

    pub fn networks(&self) -> Vec<String> {
        self.state.lock().networks.iter().cloned().collect()
    }

    fn find(&self, id: &ContainerId) -> Option<(String, FakeContainer)> {
        let state = self.state.lock();
        state
            .containers
            .iter()
            .find(|(name, c)| name.as_str() == id.as_str() || c.id == id.as_str())
            .map(|(name, c)| (name.clone(), c.clone()))
    }

    fn set_running(&self, name: &str, running: bool) {
        if let Some(c) = self.state.lock().containers.get_mut(name) {
            c.running = running;
        }
    }
}

#[async_trait]
impl ContainerOps for FakeRuntime {
    async fn inspect_container(
        &self,
        id: &ContainerId,
    ) -> Result<ContainerDetails, ContainerError> {
        let (name, c) = self
            .find(id)
            .ok_or_else(|| ContainerError::NotFound(id.to_string()))?;
        Ok(ContainerDetails {
            id: ContainerId::new(c.id),
            name,
            image: c.image,
            state: if c.running {
                ContainerState::Running
            } else {
                ContainerState::Exited
            },
            mounts: c.mounts,
            networks: c.networks,
            network_mode: None,
            raw: c.raw,
        })
    }

    async fn stop_container(&self, id: &ContainerId, _timeout: Duration) -> Result<(), ContainerError> {
        let (name, c) = self
            .find(id)
            .ok_or_else(|| ContainerError::NotFound(id.to_string()))?;
        if !c.running {
            return Err(ContainerError::NotRunning(name));
        }
        self.record(format!("stop {name}"));
        self.set_running(&name, false);
        Ok(())
    }

    async fn start_container(&self, id: &ContainerId) -> Result<(), ContainerError> {
        let (name, c) = self
            .find(id)
            .ok_or_else(|| ContainerError::NotFound(id.to_string()))?;
        if c.running {
            return Err(ContainerError::AlreadyRunning(name));
        }
        self.record(format!("start {name}"));
        self.set_running(&name, true);
        Ok(())
    }

    async fn commit_container(&self, id: &ContainerId, target: &ImageRef) -> Result<ImageId, ContainerError> {
        let (name, _) = self
            .find(id)
            .ok_or_else(|| ContainerError::NotFound(id.to_string()))?;
        if self.state.lock().fail_commit {
            return Err(ContainerError::CommitFailed("no space left on device".to_string()));
        }
        self.record(format!("commit {name} {target}"));
        self.state.lock().images.insert(target.to_string());
        Ok(ImageId::new(format!("sha256:{name}c0ffee")))
    }
}

#[async_trait]
impl ImageOps for FakeRuntime {
    async fn image_exists(&self, reference: &ImageRef) -> Result<bool, ImageError> {
        Ok(self.has_image(&reference.to_string()))
    }

    async fn pull_image(&self, reference: &ImageRef) -> Result<(), ImageError> {
        self.record(format!("pull {reference}"));
        self.state.lock().images.insert(reference.to_string());
        Ok(())
    }

    async fn save_image(&self, reference: &ImageRef) -> Result<ImageStream, ImageError> {
        let name = reference.to_string();
        if !self.has_image(&name) {
            return Err(ImageError::NotFound(name));
        }
        self.record(format!("save {name}"));
        let chunks = vec![Ok(Bytes::from("image:")), Ok(Bytes::from(name))];
        Ok(futures::stream::iter(chunks).boxed())
    }

    async fn load_image(&self, stream: ImageStream) -> Result<(), ImageError> {
        let chunks: Vec<Bytes> = stream.try_collect().await?;
        let body: Vec<u8> = chunks.iter().flat_map(|c| c.iter().copied()).collect();
        let body = String::from_utf8_lossy(&body);
        let name = body
            .strip_prefix("image:")
            .ok_or_else(|| ImageError::LoadFailed("not an image archive".to_string()))?;
        if self.state.lock().fail_load {
            return Err(ImageError::LoadFailed("unexpected EOF in layer".to_string()));
        }
        self.record(format!("load {name}"));
        self.state.lock().images.insert(name.to_string());
        Ok(())
    }
}

#[async_trait]
impl VolumeOps for FakeRuntime {
    async fn volume_exists(&self, name: &str) -> Result<bool, VolumeError> {
        Ok(self.state.lock().volumes.contains(name))
    }

    async fn create_volume(&self, name: &str) -> Result<(), VolumeError> {
        if !self.state.lock().volumes.insert(name.to_string()) {
            return Err(VolumeError::AlreadyExists(name.to_string()));
        }
        self.record(format!("create volume {name}"));
        Ok(())
    }
}

#[async_trait]
impl NetworkOps for FakeRuntime {
    async fn create_network(&self, config: &NetworkConfig) -> Result<NetworkId, NetworkError> {
        if !self.state.lock().networks.insert(config.name.clone()) {
            return Err(NetworkError::AlreadyExists(config.name.clone()));
        }
        self.record(format!("create network {}", config.name));
        Ok(NetworkId::new(format!("{}-id", config.name)))
    }

    async fn network_exists(&self, name: &str) -> Result<bool, NetworkError> {
        Ok(self.state.lock().networks.contains(name))
    }
}

#[async_trait]
impl HelperOps for FakeRuntime {
    /// Export writes a real (empty) archive into the staging bind so later
    /// steps find it; import only records the request.
    async fn run_helper(&self, spec: &HelperSpec) -> Result<HelperOutcome, HelperError> {
        if !self.has_image(&spec.image.to_string()) {
            return Err(HelperError::ImageNotFound(spec.image.to_string()));
        }
        let staging = spec
            .binds
            .iter()
            .find(|b| b.container_path == HELPER_STAGING)
            .map(|b| PathBuf::from(&b.host_path))
            .ok_or_else(|| HelperError::CreateFailed("no staging bind".to_string()))?;
        let arg = |flag: &str| {
            spec.args
                .iter()
                .position(|a| a == flag)
                .and_then(|i| spec.args.get(i + 1))
                .map(|a| a.trim_start_matches(HELPER_STAGING).trim_start_matches('/').to_string())
        };

        match spec.args.get(1).map(String::as_str) {
            Some("export") => {
                let list = arg("--files-from").unwrap_or_default();
                let output = arg("--output").unwrap_or_default();
                let paths = std::fs::read(staging.join(&list))
                    .map_err(|e| HelperError::StartFailed(e.to_string()))
                    .and_then(|bytes| {
                        archive::parse_file_list(&bytes)
                            .map_err(|e| HelperError::StartFailed(e.to_string()))
                    })?;
                let shown: Vec<String> = paths.iter().map(|p| p.display().to_string()).collect();
                self.record(format!("export {} to {}", shown.join(","), output));
                if let Some(code) = self.state.lock().helper_exit {
                    return Ok(HelperOutcome {
                        exit_code: code,
                        output: format!("ferry archive: exit {code}\n"),
                        cleanup_error: None,
                    });
                }
                let exit_code = match archive::export(&[], &staging.join(&output)) {
                    Ok(_) => 0,
                    Err(e) => i64::from(e.exit_code()),
                };
                Ok(HelperOutcome {
                    exit_code,
                    output: String::new(),
                    cleanup_error: None,
                })
            }
            Some("import") => {
                let input = arg("--input").unwrap_or_default();
                let target = spec
                    .volumes_from
                    .first()
                    .and_then(|id| self.find(id))
                    .map(|(name, _)| name)
                    .unwrap_or_default();
                self.record(format!("import {input} into {target}"));
                Ok(HelperOutcome {
                    exit_code: 0,
                    output: String::new(),
                    cleanup_error: Some("helper ferry-helper-1 left behind".to_string()),
                })
            }
            other => Err(HelperError::StartFailed(format!("unexpected helper args {other:?}"))),
        }
    }
}

#[async_trait]
impl RuntimeInfo for FakeRuntime {
    async fn info(&self) -> Result<RuntimeMetadata, RuntimeInfoError> {
        Ok(RuntimeMetadata {
            name: "fake".to_string(),
            version: "0.0.0".to_string(),
            api_version: "1.45".to_string(),
            os: "linux".to_string(),
            arch: "x86_64".to_string(),
        })
    }

    async fn ping(&self) -> Result<(), RuntimeInfoError> {
        Ok(())
    }
}

/// Remote shell backed by a [`FakeRuntime`]. `compose create` reads the
/// copied compose document and creates its service container.
pub struct FakeShell {
    journal: Journal,
    remote: Arc<FakeRuntime>,
    copies: Mutex<BTreeMap<String, PathBuf>>,
    fail_mktemp: bool,
    fail_compose: bool,
}

impl FakeShell {
    pub fn new(journal: Journal, remote: Arc<FakeRuntime>) -> Self {
        Self {
            journal,
            remote,
            copies: Mutex::new(BTreeMap::new()),
            fail_mktemp: false,
            fail_compose: false,
        }
    }

    /// `mktemp -d` exits 1 as on a read-only `/tmp`.
    pub fn failing_mktemp(mut self) -> Self {
        self.fail_mktemp = true;
        self
    }

    /// `compose ... create` exits 1 without creating anything.
    pub fn failing_compose(mut self) -> Self {
        self.fail_compose = true;
        self
    }

    fn failed(stderr: impl Into<String>) -> CommandOutput {
        CommandOutput {
            exit_code: 1,
            stdout: String::new(),
            stderr: stderr.into(),
        }
    }

    pub fn copied(&self) -> Vec<String> {
        self.copies.lock().keys().cloned().collect()
    }

    fn ok(stdout: impl Into<String>) -> CommandOutput {
        CommandOutput {
            exit_code: 0,
            stdout: stdout.into(),
            stderr: String::new(),
        }
    }

    fn compose_create(&self, command: &str) -> ssh::Result<CommandOutput> {
        let copies = self.copies.lock();
        let Some(local) = copies
            .iter()
            .find(|(remote, _)| remote.ends_with(".yml") && command.contains(remote.as_str()))
            .map(|(_, local)| local.clone())
        else {
            return Ok(Self::failed("no such file"));
        };
        drop(copies);

        let text = std::fs::read_to_string(&local)?;
        let doc: serde_yaml::Value = serde_yaml::from_str(&text)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        let services = doc["services"].as_mapping().cloned().unwrap_or_default();
        for (_, service) in services {
            let name = service["container_name"].as_str().unwrap_or_default();
            let image = service["image"].as_str().unwrap_or_default();
            let volumes: Vec<(String, String)> = service["volumes"]
                .as_sequence()
                .map(|seq| {
                    seq.iter()
                        .filter_map(|v| v.as_str())
                        .filter_map(|v| v.split_once(':'))
                        .map(|(src, dst)| (src.to_string(), dst.trim_end_matches(":ro").to_string()))
                        .collect()
                })
                .unwrap_or_default();
            self.journal.record(format!("remote: compose create {name}"));
            self.remote.create_container(name, image, &volumes);
        }
        Ok(Self::ok(""))
    }
}

#[async_trait]
impl RemoteExecutor for FakeShell {
    async fn run(&self, command: &str) -> ssh::Result<CommandOutput> {
        if command.starts_with("mktemp -d") {
            if self.fail_mktemp {
                return Ok(Self::failed("mktemp: failed to create directory: Read-only file system"));
            }
            return Ok(Self::ok(format!("{REMOTE_STAGING}\n")));
        }
        if command.starts_with("chmod") {
            return Ok(Self::ok(""));
        }
        if command.contains("compose") && command.ends_with(" create") {
            if self.fail_compose {
                return Ok(Self::failed("service \"web\" refers to undefined volume"));
            }
            return self.compose_create(command);
        }
        Ok(CommandOutput {
            exit_code: 127,
            stdout: String::new(),
            stderr: format!("unexpected command: {command}"),
        })
    }

    async fn copy_file(&self, local: &Path, remote_path: &str) -> ssh::Result<()> {
        let name = remote_path.rsplit('/').next().unwrap_or(remote_path);
        self.journal.record(format!("remote: copy {name}"));
        self.copies
            .lock()
            .insert(remote_path.to_string(), local.to_path_buf());
        Ok(())
    }
}

/// Gate that always returns the same decision.
pub struct FixedGate(pub GateDecision);

#[async_trait]
impl ConfirmationGate for FixedGate {
    async fn decide(&self, summary: &ConfirmationSummary<'_>) -> Result<GateDecision, super::MigrateError> {
        assert!(summary.checkpoint.exists(), "checkpoint written before the gate");
        Ok(self.0)
    }
}
