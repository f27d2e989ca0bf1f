// ABOUTME: Runtime type definitions for Docker and Podman.
// ABOUTME: Includes RuntimeType enum, detected socket info and explicit overrides.

use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// The container runtime type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuntimeType {
    Docker,
    Podman,
}

impl RuntimeType {
    /// Shell command that drives compose for this runtime family.
    pub fn compose_command(self) -> &'static str {
        match self {
            RuntimeType::Docker => "docker compose",
            RuntimeType::Podman => "podman compose",
        }
    }

    /// Socket path used when the runtime is chosen explicitly without a socket.
    pub fn default_socket(self) -> &'static str {
        match self {
            RuntimeType::Docker => DOCKER_SOCKET,
            RuntimeType::Podman => ROOTFUL_PODMAN,
        }
    }
}

pub(crate) const ROOTFUL_PODMAN: &str = "/run/podman/podman.sock";
pub(crate) const DOCKER_SOCKET: &str = "/var/run/docker.sock";

impl std::fmt::Display for RuntimeType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RuntimeType::Docker => write!(f, "docker"),
            RuntimeType::Podman => write!(f, "podman"),
        }
    }
}

/// Error parsing a runtime name.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown runtime '{0}' (expected docker or podman)")]
pub struct ParseRuntimeTypeError(pub String);

impl FromStr for RuntimeType {
    type Err = ParseRuntimeTypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "docker" => Ok(RuntimeType::Docker),
            "podman" => Ok(RuntimeType::Podman),
            _ => Err(ParseRuntimeTypeError(s.to_string())),
        }
    }
}

/// A runtime found by detection: its family and API socket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DetectedRuntime {
    /// The type of runtime detected.
    pub runtime_type: RuntimeType,
    /// Path to the runtime socket.
    pub socket_path: String,
}

/// Configuration for explicit runtime override.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuntimeConfig {
    /// Explicit runtime type (overrides auto-detection).
    pub runtime: Option<RuntimeType>,
    /// Explicit socket path (overrides default).
    pub socket: Option<String>,
}

impl RuntimeConfig {
    /// The explicit runtime, if one was configured.
    pub fn explicit(&self) -> Option<DetectedRuntime> {
        self.runtime.map(|runtime_type| DetectedRuntime {
            runtime_type,
            socket_path: self
                .socket
                .clone()
                .unwrap_or_else(|| runtime_type.default_socket().to_string()),
        })
    }
}
