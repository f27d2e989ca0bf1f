// ABOUTME: Compose document generation from a container's inspect metadata.
// ABOUTME: ComposeGenerator is the seam; InspectComposeGenerator is the built-in implementation.

mod document;
mod metadata;

use crate::inspect::NetworkSet;
use crate::types::{ContainerName, ImageRef};
use document::{ComposeFile, External, Service};
use metadata::Inspected;
use std::collections::BTreeMap;

/// Errors from compose generation.
#[derive(Debug, thiserror::Error)]
pub enum ComposeError {
    #[error("unreadable container metadata: {0}")]
    Metadata(#[from] serde_json::Error),

    #[error("cannot express in compose: {0}")]
    Unsupported(String),

    #[error("failed to render compose document: {0}")]
    Render(#[from] serde_yaml::Error),
}

/// Maps a container's configuration into a declarative compose document.
pub trait ComposeGenerator: Send + Sync {
    /// Render a compose document recreating `container` from `image`.
    fn generate(
        &self,
        container: &ContainerName,
        image: &ImageRef,
        metadata: &serde_json::Value,
    ) -> Result<String, ComposeError>;
}

/// Label prefixes written by compose tools; the recreated container gets fresh ones.
const COMPOSE_LABEL_PREFIXES: &[&str] = &["com.docker.compose.", "io.podman.compose."];

/// Compose generator driven by the runtime's inspect document.
#[derive(Debug, Clone, Copy, Default)]
pub struct InspectComposeGenerator;

impl ComposeGenerator for InspectComposeGenerator {
    fn generate(
        &self,
        container: &ContainerName,
        image: &ImageRef,
        metadata: &serde_json::Value,
    ) -> Result<String, ComposeError> {
        let inspected: Inspected = serde_json::from_value(metadata.clone())?;
        let file = build(container, image, inspected)?;
        Ok(serde_yaml::to_string(&file)?)
    }
}

fn build(
    container: &ContainerName,
    image: &ImageRef,
    inspected: Inspected,
) -> Result<ComposeFile, ComposeError> {
    let Inspected {
        id,
        config,
        host_config,
        mounts,
        network_settings,
    } = inspected;

    let mut service = Service {
        image: image.to_string(),
        container_name: container.to_string(),
        hostname: non_default_hostname(&config.hostname, &id),
        user: non_empty(config.user),
        working_dir: non_empty(config.working_dir),
        entrypoint: config.entrypoint.filter(|e| !e.is_empty()),
        command: config.cmd.filter(|c| !c.is_empty()),
        environment: config.env.unwrap_or_default(),
        labels: config
            .labels
            .unwrap_or_default()
            .into_iter()
            .filter(|(k, _)| !COMPOSE_LABEL_PREFIXES.iter().any(|p| k.starts_with(p)))
            .collect(),
        ports: ports(host_config.port_bindings.unwrap_or_default()),
        restart: host_config.restart_policy.and_then(|p| {
            restart_policy(p.name.as_deref().unwrap_or(""), p.maximum_retry_count)
        }),
        privileged: host_config.privileged,
        tty: config.tty,
        stdin_open: config.open_stdin,
        stop_signal: config.stop_signal.and_then(non_empty),
        cap_add: host_config.cap_add.unwrap_or_default(),
        cap_drop: host_config.cap_drop.unwrap_or_default(),
        extra_hosts: host_config.extra_hosts.unwrap_or_default(),
        ..Default::default()
    };

    let mut volumes = BTreeMap::new();
    for mount in mounts.unwrap_or_default() {
        let suffix = if mount.rw == Some(false) { ":ro" } else { "" };
        match mount.kind.as_str() {
            "volume" => {
                let Some(name) = mount.name.filter(|n| !n.is_empty()) else {
                    continue;
                };
                service
                    .volumes
                    .push(format!("{}:{}{}", name, mount.destination, suffix));
                volumes.insert(name, External::YES);
            }
            "bind" => {
                if let Some(source) = mount.source {
                    service
                        .volumes
                        .push(format!("{}:{}{}", source, mount.destination, suffix));
                }
            }
            "tmpfs" => service.tmpfs.push(mount.destination),
            other => tracing::debug!(kind = other, destination = %mount.destination, "mount skipped"),
        }
    }
    for destination in host_config.tmpfs.unwrap_or_default().into_keys() {
        if !service.tmpfs.contains(&destination) {
            service.tmpfs.push(destination);
        }
    }
    service.tmpfs.sort();

    let attached: Vec<String> = network_settings
        .networks
        .unwrap_or_default()
        .into_keys()
        .collect();
    let mut networks = BTreeMap::new();
    match network_mode(host_config.network_mode.as_deref(), &attached)? {
        NetworkPlacement::Mode(mode) => service.network_mode = Some(mode),
        NetworkPlacement::Networks(names) => {
            for name in names {
                networks.insert(name.clone(), External::YES);
                service.networks.push(name);
            }
        }
    }

    let mut services = BTreeMap::new();
    services.insert(container.to_string(), service);

    Ok(ComposeFile {
        name: container.compose_project(),
        services,
        volumes,
        networks,
    })
}

enum NetworkPlacement {
    Mode(String),
    Networks(Vec<String>),
}

fn network_mode(mode: Option<&str>, attached: &[String]) -> Result<NetworkPlacement, ComposeError> {
    match mode.unwrap_or("") {
        m @ ("host" | "none") => return Ok(NetworkPlacement::Mode(m.to_string())),
        m if m.starts_with("container:") || m.starts_with("service:") => {
            return Err(ComposeError::Unsupported(format!(
                "network mode '{m}' depends on another container"
            )));
        }
        _ => {}
    }

    let custom: Vec<String> = NetworkSet::from_names(attached)
        .custom()
        .map(String::from)
        .collect();
    if custom.is_empty() {
        Ok(NetworkPlacement::Mode("bridge".to_string()))
    } else {
        Ok(NetworkPlacement::Networks(custom))
    }
}

fn ports(bindings: BTreeMap<String, Option<Vec<metadata::PortBinding>>>) -> Vec<String> {
    let mut ports = Vec::new();
    for (key, hosts) in bindings {
        let (container_port, proto) = key.split_once('/').unwrap_or((key.as_str(), "tcp"));
        let proto_suffix = if proto == "tcp" {
            String::new()
        } else {
            format!("/{proto}")
        };
        let hosts = hosts.unwrap_or_default();
        if hosts.is_empty() {
            push_unique(&mut ports, format!("{container_port}{proto_suffix}"));
        }
        for host in hosts {
            let host_port = host.host_port.unwrap_or_default();
            let host_ip = host
                .host_ip
                .filter(|ip| !ip.is_empty() && ip != "0.0.0.0" && ip != "::");
            let entry = match (host_ip, host_port.is_empty()) {
                (Some(ip), false) => format!("{ip}:{host_port}:{container_port}{proto_suffix}"),
                (Some(ip), true) => format!("{ip}::{container_port}{proto_suffix}"),
                (None, false) => format!("{host_port}:{container_port}{proto_suffix}"),
                (None, true) => format!("{container_port}{proto_suffix}"),
            };
            push_unique(&mut ports, entry);
        }
    }
    ports
}

fn push_unique(list: &mut Vec<String>, entry: String) {
    if !list.contains(&entry) {
        list.push(entry);
    }
}

fn restart_policy(name: &str, max_retries: Option<i64>) -> Option<String> {
    match name {
        "" | "no" => None,
        "on-failure" => match max_retries {
            Some(n) if n > 0 => Some(format!("on-failure:{n}")),
            _ => Some("on-failure".to_string()),
        },
        other => Some(other.to_string()),
    }
}

// Docker defaults the hostname to the short container ID.
fn non_default_hostname(hostname: &str, id: &str) -> Option<String> {
    if hostname.is_empty() || id.starts_with(hostname) {
        None
    } else {
        Some(hostname.to_string())
    }
}

fn non_empty(s: String) -> Option<String> {
    if s.is_empty() { None } else { Some(s) }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn generate(metadata: serde_json::Value) -> serde_yaml::Value {
        let name = ContainerName::new("web").unwrap();
        let image = ImageRef::parse("web:latest").unwrap();
        let yaml = InspectComposeGenerator
            .generate(&name, &image, &metadata)
            .unwrap();
        serde_yaml::from_str(&yaml).unwrap()
    }

    #[test]
    fn restart_policy_mapping() {
        assert_eq!(restart_policy("no", None), None);
        assert_eq!(restart_policy("", Some(3)), None);
        assert_eq!(restart_policy("always", None).as_deref(), Some("always"));
        assert_eq!(
            restart_policy("on-failure", Some(5)).as_deref(),
            Some("on-failure:5")
        );
        assert_eq!(
            restart_policy("on-failure", Some(0)).as_deref(),
            Some("on-failure")
        );
    }

    #[test]
    fn default_hostname_is_dropped() {
        assert_eq!(non_default_hostname("4f2a9c1d7e3b", "4f2a9c1d7e3b5566"), None);
        assert_eq!(
            non_default_hostname("web01", "4f2a9c1d7e3b5566").as_deref(),
            Some("web01")
        );
    }

    #[test]
    fn host_ip_wildcards_collapse() {
        let mut bindings = BTreeMap::new();
        bindings.insert(
            "80/tcp".to_string(),
            Some(vec![
                metadata::PortBinding {
                    host_ip: Some("0.0.0.0".to_string()),
                    host_port: Some("8080".to_string()),
                },
                metadata::PortBinding {
                    host_ip: Some("::".to_string()),
                    host_port: Some("8080".to_string()),
                },
            ]),
        );
        bindings.insert(
            "53/udp".to_string(),
            Some(vec![metadata::PortBinding {
                host_ip: Some("127.0.0.1".to_string()),
                host_port: Some("5353".to_string()),
            }]),
        );
        assert_eq!(ports(bindings), vec!["127.0.0.1:5353:53/udp", "8080:80"]);
    }

    #[test]
    fn bridge_only_container_uses_network_mode() {
        let doc = generate(json!({
            "Id": "abc",
            "HostConfig": { "NetworkMode": "bridge" },
            "NetworkSettings": { "Networks": { "bridge": {} } }
        }));
        assert_eq!(doc["services"]["web"]["network_mode"], "bridge");
        assert!(doc.get("networks").is_none());
    }

    #[test]
    fn container_network_mode_is_rejected() {
        let name = ContainerName::new("web").unwrap();
        let image = ImageRef::parse("web:latest").unwrap();
        let err = InspectComposeGenerator
            .generate(
                &name,
                &image,
                &json!({ "HostConfig": { "NetworkMode": "container:db" } }),
            )
            .unwrap_err();
        assert!(matches!(err, ComposeError::Unsupported(_)));
    }
}
