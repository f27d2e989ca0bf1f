// ABOUTME: Composable capability traits for container runtimes.
// ABOUTME: Defines ContainerOps, ImageOps, VolumeOps, NetworkOps, HelperOps, RuntimeInfo.

mod container;
mod helper;
mod image;
mod network;
mod runtime_info;
pub(crate) mod sealed;
mod shared_types;
mod volume;

pub use container::{ContainerError, ContainerOps};
pub use helper::{HelperError, HelperOps};
pub use image::{ImageError, ImageOps};
pub use network::{NetworkError, NetworkOps};
pub use runtime_info::{RuntimeInfo, RuntimeInfoError};
pub use shared_types::*;
pub use volume::{VolumeError, VolumeOps};
