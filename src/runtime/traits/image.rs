// ABOUTME: Image operations trait for container runtimes.
// ABOUTME: Pull, push, tag and check existence of images.

use super::sealed::Sealed;
use super::shared_types::RegistryAuth;
use crate::types::{Digest, ImageRef};
use async_trait::async_trait;

/// Image operations, including the registry side of push and pull.
#[async_trait]
pub trait ImageOps: Sealed + Send + Sync {
    /// Pull an image by tag or digest from its registry.
    async fn pull_image(
        &self,
        reference: &ImageRef,
        auth: Option<&RegistryAuth>,
    ) -> Result<(), ImageError>;

    /// Push a tagged local image. Returns the manifest digest the registry holds.
    async fn push_image(
        &self,
        reference: &ImageRef,
        auth: Option<&RegistryAuth>,
    ) -> Result<Digest, ImageError>;

    /// Present `auth` to the registry holding `reference`. A repository that
    /// does not exist yet still counts as accepted.
    async fn check_access(
        &self,
        reference: &ImageRef,
        auth: Option<&RegistryAuth>,
    ) -> Result<(), ImageError>;

    /// Add `target` as a local alias for `source`.
    async fn tag_image(&self, source: &ImageRef, target: &ImageRef) -> Result<(), ImageError>;

    /// Check if an image exists locally.
    async fn image_exists(&self, reference: &ImageRef) -> Result<bool, ImageError>;
}

/// Errors from image operations.
#[derive(Debug, thiserror::Error)]
pub enum ImageError {
    #[error("image not found: {0}")]
    NotFound(String),

    #[error("authentication failed for registry: {0}")]
    AuthenticationFailed(String),

    #[error("pull failed: {0}")]
    PullFailed(String),

    #[error("push failed: {0}")]
    PushFailed(String),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("runtime error: {0}")]
    Runtime(String),
}

impl ImageError {
    /// Whether retrying the same call may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, ImageError::Transport(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_transport_errors_are_transient() {
        assert!(ImageError::Transport("reset".into()).is_transient());
        assert!(!ImageError::AuthenticationFailed("ghcr.io".into()).is_transient());
        assert!(!ImageError::NotFound("web".into()).is_transient());
        assert!(!ImageError::PushFailed("manifest invalid".into()).is_transient());
    }
}
