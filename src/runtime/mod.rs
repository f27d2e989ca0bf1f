// ABOUTME: Container runtime access for Docker and Podman.
// ABOUTME: Detection, capability traits, and the bollard-backed implementation.

mod bollard;
mod detection;
mod error;
pub mod traits;
mod types;

pub use self::bollard::{BollardRuntime, connect_local, connect_via_session};
pub use detection::{DetectionError, detect_local, detect_runtime};
pub use error::{ConnectionSnafu, DetectionSnafu, RuntimeError, RuntimeErrorKind};
pub use traits::*;
pub use types::{DetectedRuntime, ParseRuntimeTypeError, RuntimeConfig, RuntimeType};
