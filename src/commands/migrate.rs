// ABOUTME: Migrate command implementation.
// ABOUTME: Connects both runtimes, runs the migration pipeline and reports staging locations.

use super::runtime_connection::{connect_local_runtime, connect_remote_runtime};
use ferry::compose::InspectComposeGenerator;
use ferry::config::RunConfig;
use ferry::diagnostics::{Diagnostics, Warning};
use ferry::error::Result;
use ferry::migrate::{
    Completed, ConfirmationGate, Endpoints, Migration, Prepared, StagingLayout, finish,
    initialize, prepare,
};
use ferry::output::Output;
use ferry::ssh::Session;

/// Migrate the configured container to the remote host.
pub async fn migrate(config: RunConfig, gate: &dyn ConfirmationGate, mut output: Output) -> Result<()> {
    output.start_timer();
    let mut diag = Diagnostics::default();

    output.progress(&format!(
        "Migrating {} to {}",
        config.container, config.remote
    ));

    let local = connect_local_runtime(&config, &output).await?;

    output.progress(&format!("  → Connecting to {}...", config.remote));
    let session = Session::connect(config.session_config()).await?;

    let result = migrate_with_session(config, &session, &local, gate, &output, &mut diag).await;

    if let Err(e) = session.disconnect().await {
        diag.warn(Warning::ssh_disconnect(format!("SSH disconnect failed: {e}")));
    }
    for warning in diag.warnings() {
        output.warning(&warning.message);
    }

    if let Some(completed) = result? {
        report_completed(&completed, &output);
        output.success(&format!(
            "Migrated {} to {}",
            completed.container(),
            completed.config().remote
        ));
    }
    Ok(())
}

async fn migrate_with_session(
    config: RunConfig,
    session: &Session,
    local: &ferry::runtime::BollardRuntime,
    gate: &dyn ConfirmationGate,
    output: &Output,
    diag: &mut Diagnostics,
) -> Result<Option<Migration<Completed>>> {
    let remote = connect_remote_runtime(session, &config, output).await?;
    let endpoints = Endpoints {
        local,
        remote: &remote,
        shell: session,
        remote_family: remote.runtime_type(),
    };

    let migration = initialize(config, session, output).await?;
    let staging = migration.layout().clone();

    match prepare(migration, &endpoints, &InspectComposeGenerator, gate, output, diag).await? {
        Prepared::Confirmed(confirmed) => {
            let completed = finish(confirmed, &endpoints, output, diag).await?;
            Ok(Some(completed))
        }
        Prepared::Suspended { token } => {
            report_staging(&staging, output);
            output.success(&format!("Suspended. Resume with: ferry resume {}", token.display()));
            Ok(None)
        }
    }
}

pub(super) fn report_completed(completed: &Migration<Completed>, output: &Output) {
    output.progress(&format!(
        "  ✓ Remote container: {}",
        completed.remote_container().short()
    ));
    report_staging(completed.layout(), output);
}

/// Staging is never removed automatically.
fn report_staging(layout: &StagingLayout, output: &Output) {
    output.progress(&format!("  Local staging:  {}", layout.local_dir().display()));
    output.progress(&format!("  Remote staging: {}", layout.remote_dir));
}
