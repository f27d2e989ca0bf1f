// ABOUTME: Shared helpers for connecting to the local and remote container runtimes.
// ABOUTME: Remote runtimes are reached through a socket forwarded over the SSH session.

use ferry::config::RunConfig;
use ferry::error::Result;
use ferry::output::Output;
use ferry::runtime::{
    BollardRuntime, ConnectionSnafu, DetectionSnafu, RuntimeInfo, connect_local,
    connect_via_session, detect_local, detect_runtime,
};
use ferry::ssh::Session;
use snafu::ResultExt;

const LOCAL_HOST: &str = "localhost";

/// Detect and connect to the runtime on this host.
pub async fn connect_local_runtime(config: &RunConfig, output: &Output) -> Result<BollardRuntime> {
    let detected = detect_local(Some(&config.runtime)).context(DetectionSnafu { host: LOCAL_HOST })?;
    output.progress(&format!(
        "  → Local runtime: {} at {}",
        detected.runtime_type, detected.socket_path
    ));

    let runtime = connect_local(&detected, config.runtime_timeout)
        .context(ConnectionSnafu { host: LOCAL_HOST })?;
    runtime.ping().await.context(ConnectionSnafu { host: LOCAL_HOST })?;
    Ok(runtime)
}

/// Detect and connect to the runtime on the destination host.
pub async fn connect_remote_runtime(
    session: &Session,
    config: &RunConfig,
    output: &Output,
) -> Result<BollardRuntime> {
    let host = config.remote.host.as_str();
    let detected = detect_runtime(session, Some(&config.runtime))
        .await
        .context(DetectionSnafu { host })?;
    output.progress(&format!(
        "  → Remote runtime: {} at {}",
        detected.runtime_type, detected.socket_path
    ));

    let runtime = connect_via_session(session, &detected, config.runtime_timeout)
        .await
        .context(ConnectionSnafu { host })?;
    runtime.ping().await.context(ConnectionSnafu { host })?;
    Ok(runtime)
}
