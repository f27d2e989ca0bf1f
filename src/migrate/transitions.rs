// ABOUTME: State transition methods for migration orchestration.
// ABOUTME: Each method consumes self and returns the next state on success.

use std::path::{Path, PathBuf};

use crate::archive;
use crate::compose::ComposeGenerator;
use crate::config::RunConfig;
use crate::diagnostics::{Diagnostics, Warning};
use crate::inspect;
use crate::runtime::{
    BindMount, ContainerError, ContainerOps, HelperOps, HelperOutcome, HelperSpec, ImageOps,
    NetworkConfig, NetworkError, NetworkOps, RuntimeType, VolumeError, VolumeOps,
};
use crate::ssh::{RemoteExecutor, shell_quote};
use crate::types::{ContainerId, ImageRef};

use super::Migration;
use super::checkpoint::Checkpoint;
use super::error::MigrateError;
use super::gate::{ConfirmationGate, ConfirmationSummary, GateDecision};
use super::layout::{HELPER_BINARY, HELPER_STAGING, StagingLayout};
use super::state::{
    ArtifactsTransferred, AwaitingConfirmation, Captured, Completed, ConfigExported, Confirmed,
    ContainerSnapshot, ImageTransferred, Initialized, ProvisionReport, Provisioned, Recreated,
    Snapshotted, Stopped, VolumesExported, VolumesImported,
};

/// Outcome of the confirmation gate.
#[derive(Debug)]
pub enum GateOutcome {
    /// Continue with the remote half now.
    Proceed(Migration<Confirmed>),
    /// Stop here; the checkpoint path resumes the run.
    Suspended(PathBuf),
}

// =============================================================================
// Internal Helpers
// =============================================================================

/// Pull `image` unless the runtime already has it.
async fn ensure_image<R: ImageOps + ?Sized>(runtime: &R, image: &ImageRef) -> Result<(), MigrateError> {
    let present = runtime
        .image_exists(image)
        .await
        .map_err(|e| MigrateError::Runtime(e.to_string()))?;
    if !present {
        tracing::info!(image = %image, "pulling helper image");
        runtime
            .pull_image(image)
            .await
            .map_err(|e| MigrateError::Runtime(e.to_string()))?;
    }
    Ok(())
}

/// Record a leftover helper and turn its exit status into a result.
fn check_helper(
    outcome: HelperOutcome,
    destination: &Path,
    diagnostics: &mut Diagnostics,
) -> Result<(), MigrateError> {
    if let Some(cleanup) = outcome.cleanup_error {
        diagnostics.warn(Warning::helper_cleanup(cleanup));
    }
    match outcome.exit_code {
        0 => Ok(()),
        code if code == i64::from(archive::EXIT_EXISTS) => {
            Err(MigrateError::ArchiveExists(destination.to_path_buf()))
        }
        code => Err(MigrateError::ArchiveIo(format!(
            "helper exited with {}: {}",
            code,
            outcome.output.trim()
        ))),
    }
}

async fn run_remote<E: RemoteExecutor + ?Sized>(shell: &E, command: &str) -> Result<String, MigrateError> {
    let output = shell
        .run(command)
        .await
        .map_err(|e| MigrateError::RemoteExecution(format!("{command}: {e}")))?;
    if !output.success() {
        return Err(MigrateError::RemoteExecution(format!(
            "{} exited with {}: {}",
            command,
            output.exit_code,
            output.stderr.trim()
        )));
    }
    Ok(output.stdout)
}

// =============================================================================
// Construction
// =============================================================================

impl Migration<Initialized> {
    /// Create fresh staging directories on both hosts.
    ///
    /// The local directory is `<staging_root>/ferry-<container>-<timestamp>`;
    /// the remote one comes from `mktemp -d`.
    ///
    /// # Errors
    ///
    /// Returns `MigrateError::ArchiveIo` if local staging cannot be created and
    /// `MigrateError::RemoteExecution` if remote staging cannot.
    pub async fn initialize<E: RemoteExecutor + ?Sized>(
        config: RunConfig,
        shell: &E,
    ) -> Result<Self, MigrateError> {
        let local_dir = create_local_staging(&config)?;

        let stdout = run_remote(shell, "mktemp -d /tmp/ferry.XXXXXX").await?;
        let remote_dir = stdout.trim().to_string();
        if !remote_dir.starts_with('/') {
            return Err(MigrateError::RemoteExecution(format!(
                "mktemp returned an unusable path: {remote_dir:?}"
            )));
        }

        tracing::info!(
            local = %local_dir.display(),
            remote = %remote_dir,
            "staging directories created"
        );
        let layout = StagingLayout::new(&config.container, local_dir, remote_dir);
        Ok(Migration {
            config,
            layout,
            state: Initialized,
        })
    }
}

fn create_local_staging(config: &RunConfig) -> Result<PathBuf, MigrateError> {
    let io = |path: &Path, e: std::io::Error| {
        MigrateError::ArchiveIo(format!("staging {}: {e}", path.display()))
    };
    std::fs::create_dir_all(&config.staging_root).map_err(|e| io(&config.staging_root, e))?;

    let stamp = chrono::Local::now().format("%Y%m%dT%H%M%S");
    let base = format!("ferry-{}-{}", config.container, stamp);
    for attempt in 0..100u32 {
        let name = if attempt == 0 {
            base.clone()
        } else {
            format!("{base}-{attempt}")
        };
        let dir = config.staging_root.join(name);
        match std::fs::create_dir(&dir) {
            Ok(()) => return Ok(dir),
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => continue,
            Err(e) => return Err(io(&dir, e)),
        }
    }
    Err(MigrateError::ArchiveIo(format!(
        "no free staging directory name under {}",
        config.staging_root.display()
    )))
}

// =============================================================================
// Initialized -> Stopped
// =============================================================================

impl Migration<Initialized> {
    /// Stop the source container. An already-stopped container counts as stopped.
    ///
    /// # Errors
    ///
    /// Returns `MigrateError::NotFound` if the container does not exist.
    #[must_use = "migration state must be used"]
    pub async fn stop<R: ContainerOps + ?Sized>(
        self,
        local: &R,
    ) -> Result<Migration<Stopped>, MigrateError> {
        let source = ContainerId::new(self.config.container.as_str());
        match local.stop_container(&source, self.config.stop_timeout).await {
            Ok(()) => {}
            Err(ContainerError::NotRunning(_)) => {
                tracing::debug!(container = %source, "already stopped");
            }
            Err(e) => return Err(e.into()),
        }
        Ok(self.advance(Stopped { source }))
    }
}

// =============================================================================
// Stopped -> Snapshotted
// =============================================================================

impl Migration<Stopped> {
    /// Inspect the container and commit its filesystem to an image.
    ///
    /// The image name is the one the container was created from, re-tagged
    /// `latest` when untagged; a bare image ID falls back to the container name.
    ///
    /// # Errors
    ///
    /// Returns `MigrateError::Commit` if the commit fails. The container stays stopped.
    #[must_use = "migration state must be used"]
    pub async fn snapshot<R: ContainerOps + ?Sized>(
        self,
        local: &R,
    ) -> Result<Migration<Snapshotted>, MigrateError> {
        tracing::debug!(container = %self.state.source, "inspecting stopped container");
        let inspection = inspect::inspect(local, &self.config.container).await?;
        let image = ImageRef::commit_target(&inspection.image, &self.config.container);

        let image_id = local
            .commit_container(&inspection.id, &image)
            .await
            .map_err(|e| match e {
                ContainerError::NotFound(name) => MigrateError::NotFound(name),
                other => MigrateError::Commit(other.to_string()),
            })?;
        tracing::info!(image = %image, id = %image_id.short(), "container committed");

        let captured = Captured {
            source: inspection.id,
            snapshot: ContainerSnapshot {
                image,
                image_id,
                metadata: inspection.metadata,
                volumes: inspection.volumes,
                networks: inspection.networks,
            },
        };
        Ok(self.advance(Snapshotted(captured)))
    }
}

// =============================================================================
// Snapshotted -> ImageTransferred
// =============================================================================

impl Migration<Snapshotted> {
    pub fn snapshot(&self) -> &ContainerSnapshot {
        &self.state.0.snapshot
    }

    /// Stream `save` on the local runtime into `load` on the remote one.
    ///
    /// # Errors
    ///
    /// Returns `MigrateError::Transfer` on any fault at either end.
    #[must_use = "migration state must be used"]
    pub async fn transfer_image<L, R>(
        self,
        local: &L,
        remote: &R,
    ) -> Result<Migration<ImageTransferred>, MigrateError>
    where
        L: ImageOps + ?Sized,
        R: ImageOps + ?Sized,
    {
        let image = &self.state.0.snapshot.image;
        let stream = local
            .save_image(image)
            .await
            .map_err(|e| MigrateError::Transfer(format!("save {image}: {e}")))?;
        remote
            .load_image(stream)
            .await
            .map_err(|e| MigrateError::Transfer(format!("load {image}: {e}")))?;

        let Snapshotted(captured) = self.state;
        Ok(Migration {
            config: self.config,
            layout: self.layout,
            state: ImageTransferred(captured),
        })
    }
}

// =============================================================================
// ImageTransferred -> ConfigExported
// =============================================================================

impl Migration<ImageTransferred> {
    /// Generate the compose document and write it to local staging.
    ///
    /// # Errors
    ///
    /// Returns `MigrateError::Compose` if the metadata cannot be expressed.
    #[must_use = "migration state must be used"]
    pub async fn export_config<G: ComposeGenerator + ?Sized>(
        self,
        generator: &G,
    ) -> Result<Migration<ConfigExported>, MigrateError> {
        let snapshot = &self.state.0.snapshot;
        let document = generator.generate(&self.config.container, &snapshot.image, &snapshot.metadata)?;

        let path = self.layout.local_compose();
        tokio::fs::write(&path, document)
            .await
            .map_err(|e| MigrateError::ArchiveIo(format!("{}: {e}", path.display())))?;

        let ImageTransferred(captured) = self.state;
        Ok(Migration {
            config: self.config,
            layout: self.layout,
            state: ConfigExported(captured),
        })
    }
}

// =============================================================================
// ConfigExported -> VolumesExported
// =============================================================================

impl Migration<ConfigExported> {
    /// Archive the contents of every volume in the volume set.
    ///
    /// Runs the archive codec inside a helper that borrows the source
    /// container's volumes. An empty volume set writes an empty archive
    /// locally without a helper.
    ///
    /// # Errors
    ///
    /// Returns `MigrateError::ArchiveExists` if a stale archive is present and
    /// `MigrateError::ArchiveIo` on any other archive fault.
    #[must_use = "migration state must be used"]
    pub async fn export_volumes<R>(
        self,
        local: &R,
        diagnostics: &mut Diagnostics,
    ) -> Result<Migration<VolumesExported>, MigrateError>
    where
        R: HelperOps + ImageOps + ?Sized,
    {
        let archive = self.layout.local_archive();
        let volumes = &self.state.0.snapshot.volumes;

        if volumes.is_empty() {
            let dest = archive.clone();
            let summary = tokio::task::spawn_blocking(move || archive::export(&[], &dest))
                .await
                .map_err(|e| MigrateError::ArchiveIo(e.to_string()))??;
            tracing::debug!(entries = summary.entries, "wrote empty volume archive");
        } else {
            if archive.exists() {
                return Err(MigrateError::ArchiveExists(archive));
            }
            let list = archive::encode_file_list(volumes.destinations().map(Path::new));
            let list_path = self.layout.local_volume_list();
            tokio::fs::write(&list_path, list)
                .await
                .map_err(|e| MigrateError::ArchiveIo(format!("{}: {e}", list_path.display())))?;

            ensure_image(local, &self.config.base_image).await?;

            let spec = HelperSpec {
                image: self.config.base_image.clone(),
                volumes_from: vec![self.state.0.source.clone()],
                binds: vec![
                    BindMount {
                        host_path: self.layout.local_dir.display().to_string(),
                        container_path: HELPER_STAGING.to_string(),
                        read_only: false,
                    },
                    BindMount {
                        host_path: self.config.helper_binary.display().to_string(),
                        container_path: HELPER_BINARY.to_string(),
                        read_only: true,
                    },
                ],
                entrypoint: HELPER_BINARY.to_string(),
                args: vec![
                    "archive".to_string(),
                    "export".to_string(),
                    "--files-from".to_string(),
                    StagingLayout::in_helper(&self.layout.volume_list),
                    "--output".to_string(),
                    StagingLayout::in_helper(&self.layout.archive),
                ],
            };
            let outcome = local.run_helper(&spec).await?;
            check_helper(outcome, &archive, diagnostics)?;
        }

        let ConfigExported(captured) = self.state;
        Ok(Migration {
            config: self.config,
            layout: self.layout,
            state: VolumesExported(captured),
        })
    }
}

// =============================================================================
// VolumesExported -> AwaitingConfirmation
// =============================================================================

impl Migration<VolumesExported> {
    /// Write the resume checkpoint into local staging.
    ///
    /// # Errors
    ///
    /// Returns `MigrateError::Checkpoint` if it cannot be written.
    #[must_use = "migration state must be used"]
    pub fn checkpoint(self) -> Result<Migration<AwaitingConfirmation>, MigrateError> {
        let VolumesExported(captured) = self.state;
        let path = self.layout.local_checkpoint();
        Checkpoint::new(
            self.config.clone(),
            self.layout.clone(),
            captured.source.clone(),
            captured.snapshot.clone(),
        )
        .write(&path)?;

        Ok(Migration {
            config: self.config,
            layout: self.layout,
            state: AwaitingConfirmation {
                captured,
                checkpoint: path,
            },
        })
    }
}

// =============================================================================
// AwaitingConfirmation -> Confirmed
// =============================================================================

impl Migration<AwaitingConfirmation> {
    /// Ask the gate whether to touch the remote host now.
    ///
    /// # Errors
    ///
    /// Returns `MigrateError::Cancelled` if the operator declines. The
    /// checkpoint stays valid.
    pub async fn confirm<G: ConfirmationGate + ?Sized>(
        self,
        gate: &G,
    ) -> Result<GateOutcome, MigrateError> {
        let decision = {
            let snapshot = &self.state.captured.snapshot;
            let summary = ConfirmationSummary {
                container: self.config.container.as_str(),
                destination: self.config.remote.to_string(),
                image: snapshot.image.to_string(),
                volumes: snapshot.volumes.names().into_iter().map(String::from).collect(),
                networks: snapshot.networks.iter().map(String::from).collect(),
                checkpoint: &self.state.checkpoint,
            };
            gate.decide(&summary).await?
        };

        match decision {
            GateDecision::Proceed => {
                let AwaitingConfirmation { captured, .. } = self.state;
                Ok(GateOutcome::Proceed(Migration {
                    config: self.config,
                    layout: self.layout,
                    state: Confirmed(captured),
                }))
            }
            GateDecision::Suspend => Ok(GateOutcome::Suspended(self.state.checkpoint)),
            GateDecision::Cancel => Err(MigrateError::Cancelled(self.state.checkpoint)),
        }
    }
}

// =============================================================================
// Confirmed -> ArtifactsTransferred
// =============================================================================

impl Migration<Confirmed> {
    /// Copy the archive, compose document and ferry binary to remote staging.
    ///
    /// # Errors
    ///
    /// Returns `MigrateError::Transfer` if a copy fails.
    #[must_use = "migration state must be used"]
    pub async fn transfer_artifacts<E: RemoteExecutor + ?Sized>(
        self,
        shell: &E,
    ) -> Result<Migration<ArtifactsTransferred>, MigrateError> {
        let copies = [
            (self.layout.local_archive(), self.layout.remote_archive()),
            (self.layout.local_compose(), self.layout.remote_compose()),
            (self.config.helper_binary.clone(), self.layout.remote_binary()),
        ];
        for (local, remote) in &copies {
            shell
                .copy_file(local, remote)
                .await
                .map_err(|e| MigrateError::Transfer(format!("{} -> {remote}: {e}", local.display())))?;
            tracing::debug!(local = %local.display(), remote = %remote, "copied");
        }
        run_remote(
            shell,
            &format!("chmod 755 {}", shell_quote(&self.layout.remote_binary())),
        )
        .await?;

        let Confirmed(captured) = self.state;
        Ok(Migration {
            config: self.config,
            layout: self.layout,
            state: ArtifactsTransferred(captured),
        })
    }
}

// =============================================================================
// ArtifactsTransferred -> Provisioned
// =============================================================================

impl Migration<ArtifactsTransferred> {
    /// Create every volume and network the container needs that the remote
    /// runtime does not have yet. Existing ones are left untouched, and the
    /// runtime default bridges are never created.
    ///
    /// # Errors
    ///
    /// Returns `MigrateError::Runtime` if a create fails for a reason other
    /// than the resource already existing.
    #[must_use = "migration state must be used"]
    pub async fn provision<R>(self, remote: &R) -> Result<Migration<Provisioned>, MigrateError>
    where
        R: VolumeOps + NetworkOps + ?Sized,
    {
        let snapshot = &self.state.0.snapshot;
        let mut report = ProvisionReport::default();

        for name in snapshot.volumes.names() {
            if remote.volume_exists(name).await? {
                report.existing_volumes.push(name.to_string());
                continue;
            }
            match remote.create_volume(name).await {
                Ok(()) => report.created_volumes.push(name.to_string()),
                // Created concurrently between check and create
                Err(VolumeError::AlreadyExists(_)) => report.existing_volumes.push(name.to_string()),
                Err(e) => return Err(e.into()),
            }
        }

        for name in snapshot.networks.custom() {
            if remote.network_exists(name).await? {
                report.existing_networks.push(name.to_string());
                continue;
            }
            match remote.create_network(&NetworkConfig::bridge(name)).await {
                Ok(_) => report.created_networks.push(name.to_string()),
                Err(NetworkError::AlreadyExists(_)) => {
                    report.existing_networks.push(name.to_string())
                }
                Err(e) => return Err(e.into()),
            }
        }

        tracing::info!(
            created_volumes = ?report.created_volumes,
            created_networks = ?report.created_networks,
            "remote resources provisioned"
        );
        let ArtifactsTransferred(captured) = self.state;
        Ok(Migration {
            config: self.config,
            layout: self.layout,
            state: Provisioned { captured, report },
        })
    }
}

// =============================================================================
// Provisioned -> Recreated
// =============================================================================

impl Migration<Provisioned> {
    /// Run `compose create` against the transferred document.
    ///
    /// # Errors
    ///
    /// Returns `MigrateError::RemoteExecution` if compose fails or does not
    /// leave a container behind.
    #[must_use = "migration state must be used"]
    pub async fn recreate<E, R>(
        self,
        shell: &E,
        remote: &R,
        family: RuntimeType,
    ) -> Result<Migration<Recreated>, MigrateError>
    where
        E: RemoteExecutor + ?Sized,
        R: ContainerOps + ?Sized,
    {
        let command = format!(
            "{} -f {} -p {} create",
            family.compose_command(),
            shell_quote(&self.layout.remote_compose()),
            shell_quote(&self.config.container.compose_project()),
        );
        run_remote(shell, &command).await?;

        let name = ContainerId::new(self.config.container.as_str());
        let details = remote.inspect_container(&name).await.map_err(|e| {
            MigrateError::RemoteExecution(format!("compose create left no container '{name}': {e}"))
        })?;

        let Provisioned { captured, .. } = self.state;
        Ok(Migration {
            config: self.config,
            layout: self.layout,
            state: Recreated {
                captured,
                remote_container: details.id,
            },
        })
    }
}

// =============================================================================
// Recreated -> VolumesImported
// =============================================================================

impl Migration<Recreated> {
    /// Restore the archive into the recreated container's volumes.
    /// A no-op for an empty volume set.
    ///
    /// # Errors
    ///
    /// Returns `MigrateError::ArchiveIo` if the import helper fails.
    #[must_use = "migration state must be used"]
    pub async fn import_volumes<R>(
        self,
        remote: &R,
        diagnostics: &mut Diagnostics,
    ) -> Result<Migration<VolumesImported>, MigrateError>
    where
        R: HelperOps + ImageOps + ?Sized,
    {
        let Recreated {
            captured,
            remote_container,
        } = self.state;

        if captured.snapshot.volumes.is_empty() {
            tracing::debug!("no volumes to import");
        } else {
            ensure_image(remote, &self.config.base_image).await?;

            let spec = HelperSpec {
                image: self.config.base_image.clone(),
                volumes_from: vec![remote_container.clone()],
                binds: vec![BindMount {
                    host_path: self.layout.remote_dir.clone(),
                    container_path: HELPER_STAGING.to_string(),
                    read_only: true,
                }],
                entrypoint: StagingLayout::in_helper(super::layout::REMOTE_BINARY_NAME),
                args: vec![
                    "archive".to_string(),
                    "import".to_string(),
                    "--input".to_string(),
                    StagingLayout::in_helper(&self.layout.archive),
                    "--root".to_string(),
                    "/".to_string(),
                ],
            };
            let outcome = remote.run_helper(&spec).await?;
            check_helper(outcome, Path::new(&self.layout.remote_archive()), diagnostics)?;
        }

        Ok(Migration {
            config: self.config,
            layout: self.layout,
            state: VolumesImported { remote_container },
        })
    }
}

// =============================================================================
// VolumesImported -> Completed
// =============================================================================

impl Migration<VolumesImported> {
    /// Start the recreated container.
    ///
    /// # Errors
    ///
    /// Returns `MigrateError::Runtime` if the start fails.
    #[must_use = "migration state must be used"]
    pub async fn start<R: ContainerOps + ?Sized>(
        self,
        remote: &R,
    ) -> Result<Migration<Completed>, MigrateError> {
        let VolumesImported { remote_container } = self.state;
        match remote.start_container(&remote_container).await {
            Ok(()) | Err(ContainerError::AlreadyRunning(_)) => {}
            Err(e) => return Err(e.into()),
        }
        Ok(Migration {
            config: self.config,
            layout: self.layout,
            state: Completed { remote_container },
        })
    }
}
