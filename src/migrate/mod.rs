// ABOUTME: Migration orchestration using the type state pattern.
// ABOUTME: Exports state markers, the Migration struct, the confirmation gate and the step driver.

mod checkpoint;
mod error;
#[cfg(test)]
mod fakes;
mod gate;
mod layout;
mod migration;
mod pipeline;
mod state;
mod transitions;

pub use checkpoint::{CHECKPOINT_VERSION, Checkpoint};
pub use error::{MigrateError, MigrateErrorKind};
pub use gate::{
    AssumeYes, ConfirmationGate, ConfirmationSummary, GateDecision, PromptGate, SuspendGate,
};
pub use layout::{HELPER_BINARY, HELPER_STAGING, StagingLayout};
pub use migration::Migration;
pub use pipeline::{Endpoints, Prepared, StepFailure, finish, initialize, prepare};
pub use state::{
    ArtifactsTransferred, AwaitingConfirmation, Completed, ConfigExported, Confirmed,
    ContainerSnapshot, ImageTransferred, Initialized, ProvisionReport, Provisioned, Recreated,
    Snapshotted, Step, Stopped, VolumesExported, VolumesImported,
};
pub use transitions::GateOutcome;
