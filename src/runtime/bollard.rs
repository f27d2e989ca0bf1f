// ABOUTME: Bollard-based container runtime implementation.
// ABOUTME: Supports both Docker and Podman via Docker-compatible API.

use crate::runtime::traits::sealed::Sealed;
use crate::runtime::traits::{
    ContainerDetails, ContainerError, ContainerOps, ContainerState, HelperError, HelperOps,
    HelperOutcome, HelperSpec, ImageError, ImageOps, ImageStream, MountInfo, MountKind,
    NetworkConfig, NetworkError, NetworkOps, RuntimeInfo, RuntimeInfoError, RuntimeMetadata,
    VolumeError, VolumeOps,
};
use crate::runtime::types::{DetectedRuntime, RuntimeType};
use crate::ssh::Session;
use crate::types::{ContainerId, ImageId, ImageRef, NetworkId};
use async_trait::async_trait;
use bollard::Docker;
use bollard::models::{
    ContainerCreateBody, ContainerStateStatusEnum, HostConfig, MountPointTypeEnum,
    VolumeCreateOptions,
};
use bollard::query_parameters::{
    CommitContainerOptionsBuilder, CreateContainerOptions, CreateImageOptions,
    ImportImageOptions, InspectContainerOptions, LogsOptions, RemoveContainerOptions,
    StopContainerOptions, WaitContainerOptions,
};
use bytes::Bytes;
use futures::{SinkExt, StreamExt};
use std::time::Duration;

// =============================================================================
// Error Mapping Helpers
// =============================================================================

fn map_image_pull_error(e: bollard::errors::Error, image_name: &str) -> ImageError {
    ImageError::PullFailed(format!("{}: {}", image_name, e))
}

fn map_image_save_error(e: bollard::errors::Error, image_name: &str) -> ImageError {
    match &e {
        bollard::errors::Error::DockerResponseServerError { status_code, .. }
            if *status_code == 404 =>
        {
            ImageError::NotFound(image_name.to_string())
        }
        _ => ImageError::SaveFailed(format!("{}: {}", image_name, e)),
    }
}

fn map_container_start_error(e: bollard::errors::Error) -> ContainerError {
    match &e {
        bollard::errors::Error::DockerResponseServerError {
            status_code,
            message,
        } if *status_code == 404 => ContainerError::NotFound(message.clone()),
        bollard::errors::Error::DockerResponseServerError {
            status_code,
            message,
        } if *status_code == 304 => ContainerError::AlreadyRunning(message.clone()),
        _ => ContainerError::Runtime(e.to_string()),
    }
}

fn map_container_stop_error(e: bollard::errors::Error) -> ContainerError {
    match &e {
        bollard::errors::Error::DockerResponseServerError {
            status_code,
            message,
        } if *status_code == 404 => ContainerError::NotFound(message.clone()),
        bollard::errors::Error::DockerResponseServerError {
            status_code,
            message,
        } if *status_code == 304 => ContainerError::NotRunning(message.clone()),
        _ => ContainerError::Runtime(e.to_string()),
    }
}

fn map_container_not_found_error(e: bollard::errors::Error) -> ContainerError {
    match &e {
        bollard::errors::Error::DockerResponseServerError {
            status_code,
            message,
        } if *status_code == 404 => ContainerError::NotFound(message.clone()),
        _ => ContainerError::Runtime(e.to_string()),
    }
}

fn map_container_commit_error(e: bollard::errors::Error) -> ContainerError {
    match &e {
        bollard::errors::Error::DockerResponseServerError {
            status_code,
            message,
        } if *status_code == 404 => ContainerError::NotFound(message.clone()),
        _ => ContainerError::CommitFailed(e.to_string()),
    }
}

fn map_network_create_error(e: bollard::errors::Error) -> NetworkError {
    match &e {
        bollard::errors::Error::DockerResponseServerError {
            status_code,
            message,
        } if *status_code == 409 => NetworkError::AlreadyExists(message.clone()),
        _ => NetworkError::Runtime(e.to_string()),
    }
}

fn map_volume_create_error(e: bollard::errors::Error) -> VolumeError {
    match &e {
        bollard::errors::Error::DockerResponseServerError {
            status_code,
            message,
        } if *status_code == 409 => VolumeError::AlreadyExists(message.clone()),
        _ => VolumeError::Runtime(e.to_string()),
    }
}

fn map_helper_create_error(e: bollard::errors::Error) -> HelperError {
    match &e {
        bollard::errors::Error::DockerResponseServerError {
            status_code,
            message,
        } if *status_code == 404 => HelperError::ImageNotFound(message.clone()),
        _ => HelperError::CreateFailed(e.to_string()),
    }
}

fn container_state(status: Option<ContainerStateStatusEnum>) -> ContainerState {
    match status {
        Some(ContainerStateStatusEnum::CREATED) => ContainerState::Created,
        Some(ContainerStateStatusEnum::RUNNING) => ContainerState::Running,
        Some(ContainerStateStatusEnum::PAUSED) => ContainerState::Paused,
        Some(ContainerStateStatusEnum::RESTARTING) => ContainerState::Restarting,
        Some(ContainerStateStatusEnum::REMOVING) => ContainerState::Removing,
        Some(ContainerStateStatusEnum::DEAD) => ContainerState::Dead,
        _ => ContainerState::Exited,
    }
}

fn mount_kind(typ: Option<MountPointTypeEnum>) -> MountKind {
    match typ {
        Some(MountPointTypeEnum::VOLUME) => MountKind::Volume,
        Some(MountPointTypeEnum::BIND) => MountKind::Bind,
        Some(MountPointTypeEnum::TMPFS) => MountKind::Tmpfs,
        _ => MountKind::Other,
    }
}

// =============================================================================
// BollardRuntime
// =============================================================================

/// Container runtime implementation using bollard.
///
/// Supports both Docker and Podman via Docker-compatible API.
pub struct BollardRuntime {
    client: Docker,
    runtime_type: RuntimeType,
}

impl BollardRuntime {
    /// Create a new BollardRuntime from a Docker client.
    pub fn new(client: Docker, runtime_type: RuntimeType) -> Self {
        Self {
            client,
            runtime_type,
        }
    }

    /// Get the runtime type (Docker or Podman).
    pub fn runtime_type(&self) -> RuntimeType {
        self.runtime_type
    }

    async fn collect_logs(&self, id: &str) -> String {
        let opts = LogsOptions {
            stdout: true,
            stderr: true,
            tail: "all".to_string(),
            ..Default::default()
        };
        let mut stream = self.client.logs(id, Some(opts));
        let mut output = Vec::new();
        while let Some(item) = stream.next().await {
            match item {
                Ok(chunk) => output.extend_from_slice(&chunk.into_bytes()),
                Err(e) => {
                    tracing::debug!(helper = id, error = %e, "log stream ended early");
                    break;
                }
            }
        }
        String::from_utf8_lossy(&output).into_owned()
    }

    async fn wait_exit_code(&self, id: &str) -> Result<i64, HelperError> {
        let mut stream = self
            .client
            .wait_container(id, None::<WaitContainerOptions>);
        let mut exit_code = None;
        while let Some(item) = stream.next().await {
            match item {
                Ok(response) => exit_code = Some(response.status_code),
                // Nonzero exits surface as an error carrying the code.
                Err(bollard::errors::Error::DockerContainerWaitError { code, .. }) => {
                    exit_code = Some(code)
                }
                Err(e) => return Err(HelperError::WaitFailed(e.to_string())),
            }
        }
        exit_code.ok_or_else(|| HelperError::WaitFailed(format!("{id}: no exit status")))
    }
}

/// Connect to the runtime socket on this machine.
///
/// `timeout` bounds each API request, so it must cover a full image load.
pub fn connect_local(
    detected: &DetectedRuntime,
    timeout: Duration,
) -> Result<BollardRuntime, RuntimeInfoError> {
    let client = Docker::connect_with_unix(
        &detected.socket_path,
        timeout.as_secs(),
        bollard::API_DEFAULT_VERSION,
    )
    .map_err(|e| RuntimeInfoError::ConnectionFailed(e.to_string()))?;
    Ok(BollardRuntime::new(client, detected.runtime_type))
}

/// Connect to container runtime via SSH session.
///
/// Forwards the detected Docker/Podman socket from the remote server and
/// creates a BollardRuntime that communicates through the tunnel.
pub async fn connect_via_session(
    session: &Session,
    detected: &DetectedRuntime,
    timeout: Duration,
) -> Result<BollardRuntime, RuntimeInfoError> {
    let local_socket = session
        .forward_socket(&detected.socket_path)
        .await
        .map_err(|e| RuntimeInfoError::ConnectionFailed(e.to_string()))?;

    let client = Docker::connect_with_unix(
        &local_socket,
        timeout.as_secs(),
        bollard::API_DEFAULT_VERSION,
    )
    .map_err(|e| RuntimeInfoError::ConnectionFailed(e.to_string()))?;

    Ok(BollardRuntime::new(client, detected.runtime_type))
}

// Implement Sealed trait to allow runtime trait implementations
impl Sealed for BollardRuntime {}

#[async_trait]
impl RuntimeInfo for BollardRuntime {
    async fn info(&self) -> Result<RuntimeMetadata, RuntimeInfoError> {
        let info = self
            .client
            .info()
            .await
            .map_err(|e| RuntimeInfoError::ConnectionFailed(e.to_string()))?;

        let name = match self.runtime_type {
            RuntimeType::Docker => "Docker".to_string(),
            RuntimeType::Podman => "Podman".to_string(),
        };

        Ok(RuntimeMetadata {
            name,
            version: info.server_version.unwrap_or_default(),
            api_version: bollard::API_DEFAULT_VERSION.to_string(),
            os: info.operating_system.unwrap_or_default(),
            arch: info.architecture.unwrap_or_default(),
        })
    }

    async fn ping(&self) -> Result<(), RuntimeInfoError> {
        self.client
            .ping()
            .await
            .map_err(|e| RuntimeInfoError::ConnectionFailed(e.to_string()))?;
        Ok(())
    }
}

#[async_trait]
impl ImageOps for BollardRuntime {
    async fn image_exists(&self, reference: &ImageRef) -> Result<bool, ImageError> {
        let image_name = reference.to_string();
        match self.client.inspect_image(&image_name).await {
            Ok(_) => Ok(true),
            Err(bollard::errors::Error::DockerResponseServerError {
                status_code: 404, ..
            }) => Ok(false),
            Err(e) => Err(ImageError::Runtime(format!(
                "failed to inspect {}: {}",
                image_name, e
            ))),
        }
    }

    async fn pull_image(&self, reference: &ImageRef) -> Result<(), ImageError> {
        let image_name = reference.to_string();
        let opts = CreateImageOptions {
            from_image: Some(image_name.clone()),
            ..Default::default()
        };

        // Pull returns a stream of progress updates - consume it
        let mut stream = self.client.create_image(Some(opts), None, None);
        while let Some(result) = stream.next().await {
            result.map_err(|e| map_image_pull_error(e, &image_name))?;
        }
        Ok(())
    }

    async fn save_image(&self, reference: &ImageRef) -> Result<ImageStream, ImageError> {
        let image_name = reference.to_string();
        if !self.image_exists(reference).await? {
            return Err(ImageError::NotFound(image_name));
        }

        let stream = self
            .client
            .export_image(&image_name)
            .map(move |chunk| chunk.map_err(|e| map_image_save_error(e, &image_name)));
        Ok(Box::pin(stream))
    }

    async fn load_image(&self, mut stream: ImageStream) -> Result<(), ImageError> {
        // The import body must be 'static, so chunks cross a bounded channel.
        let (mut tx, rx) = futures::channel::mpsc::channel::<Bytes>(8);

        let producer = async move {
            while let Some(chunk) = stream.next().await {
                let chunk = chunk?;
                if tx.send(chunk).await.is_err() {
                    // Consumer hung up; its own error is reported below.
                    break;
                }
            }
            Ok::<(), ImageError>(())
        };

        let consumer = async {
            let mut results =
                self.client
                    .import_image_stream(ImportImageOptions::default(), rx, None);
            while let Some(result) = results.next().await {
                let info = result.map_err(|e| ImageError::LoadFailed(e.to_string()))?;
                if let Some(error) = info.error {
                    return Err(ImageError::LoadFailed(error));
                }
                if let Some(status) = info.stream.as_deref() {
                    tracing::debug!(status = status.trim(), "image load");
                }
            }
            Ok::<(), ImageError>(())
        };

        let (produced, consumed) = futures::join!(producer, consumer);
        produced?;
        consumed
    }
}

#[async_trait]
impl ContainerOps for BollardRuntime {
    async fn inspect_container(
        &self,
        id: &ContainerId,
    ) -> Result<ContainerDetails, ContainerError> {
        let details = self
            .client
            .inspect_container(id.as_str(), None::<InspectContainerOptions>)
            .await
            .map_err(map_container_not_found_error)?;

        let raw = serde_json::to_value(&details)
            .map_err(|e| ContainerError::Runtime(format!("inspect document: {e}")))?;

        let state = container_state(details.state.as_ref().and_then(|s| s.status));

        let mounts = details
            .mounts
            .unwrap_or_default()
            .into_iter()
            .map(|m| MountInfo {
                kind: mount_kind(m.typ),
                name: m.name,
                source: m.source,
                destination: m.destination.unwrap_or_default(),
                read_only: !m.rw.unwrap_or(true),
            })
            .collect();

        let networks = details
            .network_settings
            .and_then(|s| s.networks)
            .map(|nets| nets.into_keys().collect())
            .unwrap_or_default();

        Ok(ContainerDetails {
            id: ContainerId::new(details.id.unwrap_or_else(|| id.to_string())),
            name: details
                .name
                .unwrap_or_default()
                .trim_start_matches('/')
                .to_string(),
            image: details
                .config
                .as_ref()
                .and_then(|c| c.image.clone())
                .unwrap_or_default(),
            state,
            mounts,
            networks,
            network_mode: details.host_config.and_then(|h| h.network_mode),
            raw,
        })
    }

    async fn stop_container(
        &self,
        id: &ContainerId,
        timeout: Duration,
    ) -> Result<(), ContainerError> {
        let opts = StopContainerOptions {
            t: Some(timeout.as_secs() as i32),
            signal: None,
        };

        self.client
            .stop_container(id.as_str(), Some(opts))
            .await
            .map_err(map_container_stop_error)
    }

    async fn start_container(&self, id: &ContainerId) -> Result<(), ContainerError> {
        self.client
            .start_container(
                id.as_str(),
                None::<bollard::query_parameters::StartContainerOptions>,
            )
            .await
            .map_err(map_container_start_error)
    }

    async fn commit_container(
        &self,
        id: &ContainerId,
        target: &ImageRef,
    ) -> Result<ImageId, ContainerError> {
        let repo = target.repository();
        let tag = target.tag().unwrap_or("latest");
        let opts = CommitContainerOptionsBuilder::default()
            .container(id.as_str())
            .repo(&repo)
            .tag(tag)
            .build();

        self.client
            .commit_container(opts, bollard::models::ContainerConfig::default())
            .await
            .map_err(map_container_commit_error)?;

        let committed = format!("{repo}:{tag}");
        let image = self
            .client
            .inspect_image(&committed)
            .await
            .map_err(|e| ContainerError::CommitFailed(format!("{committed}: {e}")))?;
        Ok(ImageId::new(image.id.unwrap_or(committed)))
    }
}

#[async_trait]
impl VolumeOps for BollardRuntime {
    async fn volume_exists(&self, name: &str) -> Result<bool, VolumeError> {
        match self.client.inspect_volume(name).await {
            Ok(_) => Ok(true),
            Err(bollard::errors::Error::DockerResponseServerError {
                status_code: 404, ..
            }) => Ok(false),
            Err(e) => Err(VolumeError::Runtime(e.to_string())),
        }
    }

    async fn create_volume(&self, name: &str) -> Result<(), VolumeError> {
        let opts = VolumeCreateOptions {
            name: Some(name.to_string()),
            ..Default::default()
        };

        self.client
            .create_volume(opts)
            .await
            .map_err(map_volume_create_error)?;
        Ok(())
    }
}

#[async_trait]
impl NetworkOps for BollardRuntime {
    async fn create_network(&self, config: &NetworkConfig) -> Result<NetworkId, NetworkError> {
        let opts = bollard::models::NetworkCreateRequest {
            name: config.name.clone(),
            driver: config.driver.clone(),
            labels: if config.labels.is_empty() {
                None
            } else {
                Some(config.labels.clone())
            },
            ..Default::default()
        };

        let response = self
            .client
            .create_network(opts)
            .await
            .map_err(map_network_create_error)?;

        Ok(NetworkId::new(response.id))
    }

    async fn network_exists(&self, name: &str) -> Result<bool, NetworkError> {
        match self
            .client
            .inspect_network(
                name,
                None::<bollard::query_parameters::InspectNetworkOptions>,
            )
            .await
        {
            Ok(_) => Ok(true),
            Err(bollard::errors::Error::DockerResponseServerError {
                status_code: 404, ..
            }) => Ok(false),
            Err(e) => Err(NetworkError::Runtime(e.to_string())),
        }
    }
}

#[async_trait]
impl HelperOps for BollardRuntime {
    async fn run_helper(&self, spec: &HelperSpec) -> Result<HelperOutcome, HelperError> {
        let host_config = HostConfig {
            binds: Some(spec.binds.iter().map(|b| b.to_bind_string()).collect()),
            volumes_from: Some(spec.volumes_from.iter().map(|c| c.to_string()).collect()),
            ..Default::default()
        };

        let body = ContainerCreateBody {
            image: Some(spec.image.to_string()),
            entrypoint: Some(vec![spec.entrypoint.clone()]),
            cmd: Some(spec.args.clone()),
            host_config: Some(host_config),
            ..Default::default()
        };

        let created = self
            .client
            .create_container(None::<CreateContainerOptions>, body)
            .await
            .map_err(map_helper_create_error)?;
        let id = created.id;
        tracing::debug!(helper = %id, image = %spec.image, args = ?spec.args, "helper created");

        let run = async {
            self.client
                .start_container(
                    &id,
                    None::<bollard::query_parameters::StartContainerOptions>,
                )
                .await
                .map_err(|e| HelperError::StartFailed(e.to_string()))?;
            self.wait_exit_code(&id).await
        };
        let exit = run.await;
        let output = self.collect_logs(&id).await;

        let remove = RemoveContainerOptions {
            force: true,
            ..Default::default()
        };
        let cleanup_error = self
            .client
            .remove_container(&id, Some(remove))
            .await
            .err()
            .map(|e| format!("failed to remove helper {}: {}", &id, e));

        Ok(HelperOutcome {
            exit_code: exit?,
            output,
            cleanup_error,
        })
    }
}
