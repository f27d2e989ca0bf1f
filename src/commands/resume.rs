// ABOUTME: Resume command implementation.
// ABOUTME: Loads a confirmation checkpoint and runs the remote half of the migration.

use super::migrate::report_completed;
use super::runtime_connection::connect_remote_runtime;
use ferry::diagnostics::{Diagnostics, Warning};
use ferry::error::Result;
use ferry::migrate::{Checkpoint, Endpoints, Migration, StepFailure, Step, finish};
use ferry::output::Output;
use ferry::ssh::Session;
use std::path::Path;

/// Finish the migration recorded in the checkpoint at `token`.
pub async fn resume(token: &Path, mut output: Output) -> Result<()> {
    output.start_timer();
    let mut diag = Diagnostics::default();

    let checkpoint = Checkpoint::load(token).map_err(|source| StepFailure {
        step: Step::Confirmation,
        source,
    })?;
    tracing::info!(
        container = %checkpoint.config.container,
        written = %checkpoint.created_at,
        "resuming from checkpoint"
    );

    // The binary copied to the remote host is whichever ferry is running now.
    let helper = std::env::current_exe()?;
    let migration = Migration::from_checkpoint(checkpoint).with_helper_binary(helper);
    let config = migration.config().clone();

    output.progress(&format!(
        "Resuming {} to {}",
        config.container, config.remote
    ));
    output.progress(&format!("  → Connecting to {}...", config.remote));
    let session = Session::connect(config.session_config()).await?;

    let result = async {
        let remote = connect_remote_runtime(&session, &config, &output).await?;
        let endpoints = Endpoints {
            local: &(),
            remote: &remote,
            shell: &session,
            remote_family: remote.runtime_type(),
        };
        Ok::<_, ferry::error::Error>(finish(migration, &endpoints, &output, &mut diag).await?)
    }
    .await;

    if let Err(e) = session.disconnect().await {
        diag.warn(Warning::ssh_disconnect(format!("SSH disconnect failed: {e}")));
    }
    for warning in diag.warnings() {
        output.warning(&warning.message);
    }

    let completed = result?;
    report_completed(&completed, &output);
    output.success(&format!(
        "Migrated {} to {}",
        completed.container(),
        completed.config().remote
    ));
    Ok(())
}
