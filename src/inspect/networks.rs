// ABOUTME: Network set derived from a container's network attachments.
// ABOUTME: Excludes the host network; runtime default bridges are kept but never provisioned.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Network that is never provisioned or declared.
pub const HOST_NETWORK: &str = "host";

/// Bridges every runtime family creates on its own. A container attached
/// only to these runs on the target's default bridge.
pub const DEFAULT_NETWORKS: &[&str] = &["bridge", "default", "podman"];

/// Whether `name` is one of the runtime-owned default bridges.
fn is_default_network(name: &str) -> bool {
    DEFAULT_NETWORKS.contains(&name)
}

/// Names of the networks a container is attached to, minus `host`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkSet {
    names: BTreeSet<String>,
}

impl NetworkSet {
    pub fn from_names<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let names = names
            .into_iter()
            .map(|n| n.as_ref().to_string())
            .filter(|n| !n.is_empty() && n != HOST_NETWORK)
            .collect();
        Self { names }
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.names.iter().map(String::as_str)
    }

    /// User-defined networks: the ones the target may have to create.
    pub fn custom(&self) -> impl Iterator<Item = &str> {
        self.iter().filter(|n| !is_default_network(n))
    }
}
