// ABOUTME: Image operations trait for container runtimes.
// ABOUTME: Check existence, pull, save to a byte stream, and load from one.

use super::sealed::Sealed;
use super::shared_types::ImageStream;
use crate::types::ImageRef;
use async_trait::async_trait;

/// Image operations: existence, pull, save, load.
#[async_trait]
pub trait ImageOps: Sealed + Send + Sync {
    /// Check if an image exists locally.
    async fn image_exists(&self, reference: &ImageRef) -> Result<bool, ImageError>;

    /// Pull an image from its registry.
    async fn pull_image(&self, reference: &ImageRef) -> Result<(), ImageError>;

    /// Export an image as a tar stream (`docker save`).
    async fn save_image(&self, reference: &ImageRef) -> Result<ImageStream, ImageError>;

    /// Load images from a tar stream (`docker load`), consuming it fully.
    async fn load_image(&self, stream: ImageStream) -> Result<(), ImageError>;
}

/// Errors from image operations.
#[derive(Debug, thiserror::Error)]
pub enum ImageError {
    #[error("image not found: {0}")]
    NotFound(String),

    #[error("pull failed: {0}")]
    PullFailed(String),

    #[error("save failed: {0}")]
    SaveFailed(String),

    #[error("load failed: {0}")]
    LoadFailed(String),

    #[error("runtime error: {0}")]
    Runtime(String),
}
