// ABOUTME: Volume set derived from a container's mounts.
// ABOUTME: Maps each named-volume destination to its backing volume name.

use crate::runtime::{MountInfo, MountKind};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Named volumes mounted into a container, keyed by mount destination.
///
/// Built only from `volume` mounts that carry a name. Ordering is by
/// destination, so two mount lists with the same contents produce equal
/// sets regardless of the order the runtime reported them in.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VolumeSet {
    mounts: BTreeMap<String, String>,
}

impl VolumeSet {
    pub fn from_mounts<'a>(mounts: impl IntoIterator<Item = &'a MountInfo>) -> Self {
        let mounts = mounts
            .into_iter()
            .filter(|m| m.kind == MountKind::Volume)
            .filter_map(|m| {
                let name = m.name.as_deref().filter(|n| !n.is_empty())?;
                Some((m.destination.clone(), name.to_string()))
            })
            .collect();
        Self { mounts }
    }

    pub fn is_empty(&self) -> bool {
        self.mounts.is_empty()
    }

    pub fn len(&self) -> usize {
        self.mounts.len()
    }

    /// Mount destinations in order.
    pub fn destinations(&self) -> impl Iterator<Item = &str> {
        self.mounts.keys().map(String::as_str)
    }

    /// Distinct volume names, in destination order.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = Vec::with_capacity(self.mounts.len());
        for name in self.mounts.values() {
            if !names.contains(&name.as_str()) {
                names.push(name);
            }
        }
        names
    }

    /// (destination, volume name) pairs in destination order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.mounts.iter().map(|(d, n)| (d.as_str(), n.as_str()))
    }
}
