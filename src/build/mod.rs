// ABOUTME: Artifact building: turn a build context into a content-addressed image.
// ABOUTME: The real builder shells out to docker/podman/buildah; a simulated one feeds dry runs.

mod context;
mod error;
mod simulated;
mod tool;

pub use context::BuildContext;
pub use error::{BuildError, BuildStage};
pub use simulated::SimulatedBuilder;
pub use tool::ArtifactBuilder;

use crate::types::ArtifactReference;
use async_trait::async_trait;

/// Produces an artifact from a build context. Builders never retry.
#[async_trait]
pub trait Builder: Send + Sync {
    /// Consumes the context; it cannot change once a build starts.
    async fn build(&self, context: BuildContext) -> Result<ArtifactReference, BuildError>;
}
