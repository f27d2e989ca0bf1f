// ABOUTME: Integration tests for compose generation from inspect documents.
// ABOUTME: Feeds realistic Docker and Podman inspect output through the generator.

use ferry::compose::{ComposeError, ComposeGenerator, InspectComposeGenerator};
use ferry::types::{ContainerName, ImageRef};
use serde_json::json;
use serde_yaml::Value;

fn generate(container: &str, metadata: serde_json::Value) -> Result<Value, ComposeError> {
    let name = ContainerName::new(container).unwrap();
    let image = ImageRef::parse(&format!("{container}:latest")).unwrap();
    let yaml = InspectComposeGenerator.generate(&name, &image, &metadata)?;
    Ok(serde_yaml::from_str(&yaml).unwrap())
}

fn docker_web() -> serde_json::Value {
    json!({
        "Id": "4f2a9c1d7e3b5566778899aabbccddeeff00112233445566778899aabbccddee",
        "Name": "/web",
        "Config": {
            "Hostname": "4f2a9c1d7e3b",
            "User": "www-data",
            "WorkingDir": "/srv",
            "Env": ["PATH=/usr/local/sbin:/usr/bin", "APP_ENV=production"],
            "Cmd": ["nginx", "-g", "daemon off;"],
            "Entrypoint": null,
            "Labels": {
                "com.docker.compose.project": "old",
                "com.docker.compose.service": "web",
                "traefik.enable": "true"
            },
            "Tty": false,
            "OpenStdin": false,
            "StopSignal": "SIGQUIT"
        },
        "HostConfig": {
            "NetworkMode": "frontend",
            "PortBindings": {
                "80/tcp": [{ "HostIp": "", "HostPort": "8080" }],
                "443/tcp": [{ "HostIp": "0.0.0.0", "HostPort": "8443" }, { "HostIp": "::", "HostPort": "8443" }]
            },
            "RestartPolicy": { "Name": "on-failure", "MaximumRetryCount": 3 },
            "Privileged": false,
            "CapAdd": ["NET_ADMIN"],
            "CapDrop": null,
            "ExtraHosts": ["db:10.0.0.5"]
        },
        "Mounts": [
            { "Type": "volume", "Name": "web-data", "Source": "/var/lib/docker/volumes/web-data/_data", "Destination": "/data", "RW": true },
            { "Type": "bind", "Source": "/etc/web/nginx.conf", "Destination": "/etc/nginx/nginx.conf", "RW": false },
            { "Type": "tmpfs", "Source": "", "Destination": "/run", "RW": true }
        ],
        "NetworkSettings": {
            "Networks": { "frontend": {}, "backend": {} }
        }
    })
}

#[test]
fn docker_container_maps_to_a_single_service() {
    let doc = generate("web", docker_web()).unwrap();
    let service = &doc["services"]["web"];

    assert_eq!(doc["name"], "web");
    assert_eq!(service["image"], "web:latest");
    assert_eq!(service["container_name"], "web");
    assert!(service.get("hostname").is_none());
    assert_eq!(service["user"], "www-data");
    assert_eq!(service["working_dir"], "/srv");
    assert_eq!(service["command"][2], "daemon off;");
    assert!(service.get("entrypoint").is_none());
    assert_eq!(service["environment"][1], "APP_ENV=production");
    assert_eq!(service["restart"], "on-failure:3");
    assert_eq!(service["stop_signal"], "SIGQUIT");
    assert_eq!(service["cap_add"][0], "NET_ADMIN");
    assert_eq!(service["extra_hosts"][0], "db:10.0.0.5");
}

#[test]
fn compose_bookkeeping_labels_are_dropped() {
    let doc = generate("web", docker_web()).unwrap();
    let labels = doc["services"]["web"]["labels"].as_mapping().unwrap();
    assert_eq!(labels.len(), 1);
    assert_eq!(labels.get("traefik.enable").and_then(Value::as_str), Some("true"));
}

#[test]
fn ports_collapse_wildcard_addresses() {
    let doc = generate("web", docker_web()).unwrap();
    let ports: Vec<&str> = doc["services"]["web"]["ports"]
        .as_sequence()
        .unwrap()
        .iter()
        .filter_map(Value::as_str)
        .collect();
    assert_eq!(ports, vec!["8443:443", "8080:80"]);
}

#[test]
fn mounts_become_volumes_binds_and_tmpfs() {
    let doc = generate("web", docker_web()).unwrap();
    let service = &doc["services"]["web"];

    assert_eq!(service["volumes"][0], "web-data:/data");
    assert_eq!(service["volumes"][1], "/etc/web/nginx.conf:/etc/nginx/nginx.conf:ro");
    assert_eq!(service["tmpfs"][0], "/run");
    assert_eq!(doc["volumes"]["web-data"]["external"], true);
    assert!(doc["volumes"].get("/etc/web/nginx.conf").is_none());
}

#[test]
fn custom_networks_are_external() {
    let doc = generate("web", docker_web()).unwrap();
    let service = &doc["services"]["web"];

    assert!(service.get("network_mode").is_none());
    assert_eq!(service["networks"][0], "backend");
    assert_eq!(service["networks"][1], "frontend");
    assert_eq!(doc["networks"]["frontend"]["external"], true);
}

#[test]
fn podman_default_network_uses_bridge_mode() {
    let doc = generate(
        "cache",
        json!({
            "Id": "9a8b7c",
            "Config": { "Hostname": "redis01" },
            "HostConfig": { "NetworkMode": "bridge" },
            "NetworkSettings": { "Networks": { "podman": {} } }
        }),
    )
    .unwrap();
    let service = &doc["services"]["cache"];
    assert_eq!(service["network_mode"], "bridge");
    assert_eq!(service["hostname"], "redis01");
    assert!(doc.get("networks").is_none());
}

#[test]
fn host_networking_is_kept() {
    let doc = generate(
        "agent",
        json!({ "HostConfig": { "NetworkMode": "host" }, "NetworkSettings": { "Networks": { "host": {} } } }),
    )
    .unwrap();
    assert_eq!(doc["services"]["agent"]["network_mode"], "host");
}

#[test]
fn shared_network_namespace_is_unsupported() {
    let err = generate("sidecar", json!({ "HostConfig": { "NetworkMode": "container:web" } })).unwrap_err();
    assert!(matches!(err, ComposeError::Unsupported(_)));
}

#[test]
fn non_object_metadata_is_rejected() {
    let err = generate("web", json!("not an object")).unwrap_err();
    assert!(matches!(err, ComposeError::Metadata(_)));
}
