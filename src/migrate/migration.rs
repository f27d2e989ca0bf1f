// ABOUTME: Generic migration struct parameterized by state.
// ABOUTME: Holds the frozen run configuration and staging layout across every transition.

use crate::config::RunConfig;
use crate::types::{ContainerId, ContainerName};

use super::checkpoint::Checkpoint;
use super::layout::StagingLayout;
use super::state::{
    AwaitingConfirmation, Captured, Completed, Confirmed, ContainerSnapshot, Provisioned,
    ProvisionReport, Recreated,
};

/// A migration in progress, parameterized by its current state.
///
/// Transitions consume the migration and return the next state, so a step
/// cannot run twice or out of order. State types carry the data produced by
/// earlier steps (source ID, snapshot, remote container).
#[derive(Debug)]
pub struct Migration<S> {
    pub(crate) config: RunConfig,
    pub(crate) layout: StagingLayout,
    pub(crate) state: S,
}

impl<S> Migration<S> {
    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    pub fn layout(&self) -> &StagingLayout {
        &self.layout
    }

    pub fn container(&self) -> &ContainerName {
        &self.config.container
    }

    /// Move to the next state, keeping config and layout.
    pub(crate) fn advance<T>(self, state: T) -> Migration<T> {
        Migration {
            config: self.config,
            layout: self.layout,
            state,
        }
    }
}

impl Migration<AwaitingConfirmation> {
    pub fn snapshot(&self) -> &ContainerSnapshot {
        &self.state.captured.snapshot
    }
}

impl Migration<Confirmed> {
    /// Rebuild the post-confirmation half from a checkpoint.
    pub fn from_checkpoint(checkpoint: Checkpoint) -> Self {
        Migration {
            config: checkpoint.config,
            layout: checkpoint.layout,
            state: Confirmed(Captured {
                source: checkpoint.source,
                snapshot: checkpoint.snapshot,
            }),
        }
    }

    pub fn snapshot(&self) -> &ContainerSnapshot {
        &self.state.0.snapshot
    }

    /// Use a different ferry binary for the remote helper.
    pub fn with_helper_binary(self, helper_binary: impl Into<std::path::PathBuf>) -> Self {
        Migration {
            config: self.config.with_helper_binary(helper_binary),
            layout: self.layout,
            state: self.state,
        }
    }
}

impl Migration<Provisioned> {
    pub fn report(&self) -> &ProvisionReport {
        &self.state.report
    }
}

impl Migration<Recreated> {
    pub fn remote_container(&self) -> &ContainerId {
        &self.state.remote_container
    }
}

impl Migration<Completed> {
    pub fn remote_container(&self) -> &ContainerId {
        &self.state.remote_container
    }
}
