// ABOUTME: SimulatedBuilder: validates the context and loads a synthetic image into memory.
// ABOUTME: Used by --dry-run and tests; no external tool runs.

use super::context::BuildContext;
use super::error::BuildError;
use super::Builder;
use crate::runtime::InMemoryRuntime;
use crate::types::{ArtifactReference, Digest};
use async_trait::async_trait;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

pub struct SimulatedBuilder {
    runtime: Arc<InMemoryRuntime>,
    digest: Option<Digest>,
}

impl SimulatedBuilder {
    pub fn new(runtime: Arc<InMemoryRuntime>) -> Self {
        Self {
            runtime,
            digest: None,
        }
    }

    /// Report this digest for every build instead of hashing the recipe.
    pub fn with_digest(mut self, digest: Digest) -> Self {
        self.digest = Some(digest);
        self
    }

    fn fingerprint(context: &BuildContext) -> Result<Digest, BuildError> {
        let recipe = std::fs::read(context.recipe_path())
            .map_err(|e| BuildError::prepare(format!("cannot read recipe: {}", e)))?;
        let mut hasher = DefaultHasher::new();
        recipe.hash(&mut hasher);
        context.build_args().hash(&mut hasher);
        Digest::parse(&format!("dryrun:{:016x}", hasher.finish()))
            .map_err(|e| BuildError::digest(e.to_string(), Vec::new()))
    }
}

#[async_trait]
impl Builder for SimulatedBuilder {
    async fn build(&self, context: BuildContext) -> Result<ArtifactReference, BuildError> {
        context.check()?;
        let target = context.target()?;
        let digest = match &self.digest {
            Some(d) => d.clone(),
            None => Self::fingerprint(&context)?,
        };

        self.runtime.load_image(&target, digest.clone());
        tracing::info!(image = %target, %digest, "simulated build finished");
        Ok(ArtifactReference::new(context.image(), context.tag(), digest))
    }
}
