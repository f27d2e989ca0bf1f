// ABOUTME: Integration tests for the bollard runtime against a local daemon.
// ABOUTME: Each test skips itself when no Docker or Podman socket is reachable.

mod support;

use ferry::runtime::{
    BollardRuntime, ContainerError, ContainerOps, ImageOps, NetworkOps, RuntimeInfo, VolumeOps,
    connect_local, detect_local,
};
use ferry::types::{ContainerId, ImageRef};
use std::time::Duration;

/// Get local runtime, skipping test if unavailable.
async fn local_runtime() -> Option<BollardRuntime> {
    support::init_tracing();
    let detected = detect_local(None).ok()?;
    let runtime = connect_local(&detected, Duration::from_secs(30)).ok()?;
    runtime.ping().await.ok()?;
    Some(runtime)
}

/// Skip test if no local runtime available.
macro_rules! require_runtime {
    () => {
        match local_runtime().await {
            Some(rt) => rt,
            None => {
                eprintln!("Skipping test: no local container runtime found");
                return;
            }
        }
    };
}

#[tokio::test]
async fn info_reports_a_version() {
    let runtime = require_runtime!();

    let info = runtime.info().await.expect("info should succeed");
    assert!(!info.version.is_empty());
    assert!(!info.api_version.is_empty());
}

#[tokio::test]
async fn image_exists_false_for_nonexistent() {
    let runtime = require_runtime!();

    let image_ref = ImageRef::parse("ferry-image-that-does-not-exist-12345:v999")
        .expect("valid image ref");
    let exists = runtime
        .image_exists(&image_ref)
        .await
        .expect("image_exists should succeed");
    assert!(!exists);
}

#[tokio::test]
async fn inspect_missing_container_is_not_found() {
    let runtime = require_runtime!();

    let id = ContainerId::new(format!("ferry-missing-{}", std::process::id()));
    let err = runtime.inspect_container(&id).await.unwrap_err();
    assert!(matches!(err, ContainerError::NotFound(_)), "got {err:?}");
}

#[tokio::test]
async fn missing_volume_and_network_do_not_exist() {
    let runtime = require_runtime!();

    let name = format!("ferry-missing-{}", std::process::id());
    assert!(!runtime.volume_exists(&name).await.unwrap());
    assert!(!runtime.network_exists(&name).await.unwrap());
}
