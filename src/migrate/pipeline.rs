// ABOUTME: Drives the migration state machine step by step.
// ABOUTME: Reports each step to the operator and logs the failing step with its error kind.

use std::path::PathBuf;

use crate::compose::ComposeGenerator;
use crate::config::RunConfig;
use crate::diagnostics::Diagnostics;
use crate::output::Output;
use crate::runtime::{
    ContainerOps, HelperOps, ImageOps, NetworkOps, RuntimeType, VolumeOps,
};
use crate::ssh::RemoteExecutor;

use super::Migration;
use super::error::{MigrateError, MigrateErrorKind};
use super::gate::ConfirmationGate;
use super::state::{Completed, Confirmed, Initialized, Step};
use super::transitions::GateOutcome;

/// A migration step that failed, with the error it returned.
#[derive(Debug, thiserror::Error)]
#[error("{step} failed: {source}")]
pub struct StepFailure {
    pub step: Step,
    #[source]
    pub source: MigrateError,
}

impl StepFailure {
    pub fn kind(&self) -> MigrateErrorKind {
        self.source.kind()
    }
}

/// Both runtimes and the remote shell a migration runs against.
pub struct Endpoints<'a, L: ?Sized, R: ?Sized, E: ?Sized> {
    pub local: &'a L,
    pub remote: &'a R,
    pub shell: &'a E,
    /// Decides which compose command runs on the remote host.
    pub remote_family: RuntimeType,
}

/// Where the local half stopped.
#[derive(Debug)]
pub enum Prepared {
    /// Operator approved; ready for [`finish`].
    Confirmed(Migration<Confirmed>),
    /// Suspended at the gate; `token` resumes the run.
    Suspended { token: PathBuf },
}

fn begin(step: Step, output: &Output) {
    tracing::info!(step = %step, "step started");
    output.step(&capitalize(&step.to_string()));
}

fn failed(step: Step) -> impl FnOnce(MigrateError) -> StepFailure {
    move |source| {
        tracing::error!(step = %step, kind = ?source.kind(), error = %source, "step failed");
        StepFailure { step, source }
    }
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Create staging on both hosts.
pub async fn initialize<E: RemoteExecutor + ?Sized>(
    config: RunConfig,
    shell: &E,
    output: &Output,
) -> Result<Migration<Initialized>, StepFailure> {
    begin(Step::Initializing, output);
    Migration::initialize(config, shell)
        .await
        .map_err(failed(Step::Initializing))
}

/// Run the local half: stop, snapshot, image transfer, config and volume
/// export, then the confirmation gate.
pub async fn prepare<L, R, E, C, G>(
    migration: Migration<Initialized>,
    endpoints: &Endpoints<'_, L, R, E>,
    generator: &C,
    gate: &G,
    output: &Output,
    diagnostics: &mut Diagnostics,
) -> Result<Prepared, StepFailure>
where
    L: ContainerOps + ImageOps + HelperOps + ?Sized,
    R: ImageOps + ?Sized,
    E: ?Sized,
    C: ComposeGenerator + ?Sized,
    G: ConfirmationGate + ?Sized,
{
    begin(Step::Stopping, output);
    let migration = migration
        .stop(endpoints.local)
        .await
        .map_err(failed(Step::Stopping))?;

    begin(Step::Snapshotting, output);
    let migration = migration
        .snapshot(endpoints.local)
        .await
        .map_err(failed(Step::Snapshotting))?;

    begin(Step::TransferringImage, output);
    let migration = migration
        .transfer_image(endpoints.local, endpoints.remote)
        .await
        .map_err(failed(Step::TransferringImage))?;

    begin(Step::ExportingConfig, output);
    let migration = migration
        .export_config(generator)
        .await
        .map_err(failed(Step::ExportingConfig))?;

    begin(Step::ExportingVolumes, output);
    let migration = migration
        .export_volumes(endpoints.local, diagnostics)
        .await
        .map_err(failed(Step::ExportingVolumes))?;

    begin(Step::Confirmation, output);
    let migration = migration
        .checkpoint()
        .map_err(failed(Step::Confirmation))?;
    match migration
        .confirm(gate)
        .await
        .map_err(failed(Step::Confirmation))?
    {
        GateOutcome::Proceed(confirmed) => Ok(Prepared::Confirmed(confirmed)),
        GateOutcome::Suspended(token) => {
            tracing::info!(token = %token.display(), "suspended at confirmation");
            Ok(Prepared::Suspended { token })
        }
    }
}

/// Run the remote half: artifacts, provisioning, recreate, volume import, start.
pub async fn finish<L, R, E>(
    migration: Migration<Confirmed>,
    endpoints: &Endpoints<'_, L, R, E>,
    output: &Output,
    diagnostics: &mut Diagnostics,
) -> Result<Migration<Completed>, StepFailure>
where
    L: ?Sized,
    R: ContainerOps + ImageOps + VolumeOps + NetworkOps + HelperOps + ?Sized,
    E: RemoteExecutor + ?Sized,
{
    begin(Step::TransferringArtifacts, output);
    let migration = migration
        .transfer_artifacts(endpoints.shell)
        .await
        .map_err(failed(Step::TransferringArtifacts))?;

    begin(Step::Provisioning, output);
    let migration = migration
        .provision(endpoints.remote)
        .await
        .map_err(failed(Step::Provisioning))?;
    let report = migration.report();
    if !report.created_anything() {
        tracing::debug!("remote already had every volume and network");
    }

    begin(Step::Recreating, output);
    let migration = migration
        .recreate(endpoints.shell, endpoints.remote, endpoints.remote_family)
        .await
        .map_err(failed(Step::Recreating))?;

    begin(Step::ImportingVolumes, output);
    let migration = migration
        .import_volumes(endpoints.remote, diagnostics)
        .await
        .map_err(failed(Step::ImportingVolumes))?;

    begin(Step::StartingRemote, output);
    let migration = migration
        .start(endpoints.remote)
        .await
        .map_err(failed(Step::StartingRemote))?;

    tracing::info!(container = %migration.remote_container(), "migration completed");
    Ok(migration)
}
