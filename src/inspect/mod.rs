// ABOUTME: Runtime inspector: reads the facts a migration needs from a container.
// ABOUTME: Image, full metadata document, volume set and network set.

mod networks;
mod volumes;

pub use networks::{HOST_NETWORK, NetworkSet};
pub use volumes::VolumeSet;

use crate::runtime::{ContainerDetails, ContainerError, ContainerOps};
use crate::types::{ContainerId, ContainerName};

/// Errors from inspecting a container.
#[derive(Debug, thiserror::Error)]
pub enum InspectError {
    #[error("container '{0}' not found")]
    NotFound(String),

    #[error("failed to inspect '{name}': {source}")]
    Runtime {
        name: String,
        #[source]
        source: ContainerError,
    },
}

/// What the migration needs to know about one container.
#[derive(Debug, Clone)]
pub struct Inspection {
    /// Resolved container ID.
    pub id: ContainerId,
    /// Image reference the container was created from, as configured.
    pub image: String,
    /// Full inspect document.
    pub metadata: serde_json::Value,
    pub volumes: VolumeSet,
    pub networks: NetworkSet,
}

impl Inspection {
    pub fn from_details(details: ContainerDetails) -> Self {
        Self {
            volumes: VolumeSet::from_mounts(&details.mounts),
            networks: NetworkSet::from_names(&details.networks),
            id: details.id,
            image: details.image,
            metadata: details.raw,
        }
    }
}

/// Inspect `name` on `runtime`.
pub async fn inspect<R>(runtime: &R, name: &ContainerName) -> Result<Inspection, InspectError>
where
    R: ContainerOps + ?Sized,
{
    let id = ContainerId::new(name.as_str());
    match runtime.inspect_container(&id).await {
        Ok(details) => {
            let inspection = Inspection::from_details(details);
            tracing::debug!(
                container = %name,
                image = %inspection.image,
                volumes = inspection.volumes.len(),
                networks = inspection.networks.len(),
                "inspected"
            );
            Ok(inspection)
        }
        Err(ContainerError::NotFound(_)) => Err(InspectError::NotFound(name.to_string())),
        Err(source) => Err(InspectError::Runtime {
            name: name.to_string(),
            source,
        }),
    }
}
