// ABOUTME: Turns a loaded config into an orchestrator with every job bound.
// ABOUTME: Components are passed in so dry runs and tests swap in simulated ones.

use super::graph::JobKind;
use super::jobs::{BuildJob, DeployJob, JobAction, PromoteJob, PublishJob, VerifyJob};
use super::orchestrator::Orchestrator;
use crate::build::{BuildContext, Builder};
use crate::cancel::CancelToken;
use crate::config::{Config, resolve_env_map};
use crate::error::{Error, Result};
use crate::probe::Probe;
use crate::registry::{Credential, RegistryClient};
use crate::target::DeploymentTarget;
use std::path::Path;
use std::sync::Arc;

/// The collaborators a pipeline run drives.
pub struct Components {
    pub builder: Arc<dyn Builder>,
    pub registry: Arc<dyn RegistryClient>,
    pub target: Arc<dyn DeploymentTarget>,
    pub probe: Arc<dyn Probe>,
}

/// Bind every job in `config`'s graph. `base` is the directory the build
/// context is relative to; `tag` is this run's unique image tag.
pub fn assemble(
    config: &Config,
    base: &Path,
    tag: &str,
    components: Components,
    credential: Arc<Credential>,
    cancel: CancelToken,
) -> Result<Orchestrator> {
    let graph = config.graph()?;
    let host = config.registry.host(&config.image).to_string();

    let tagged = config
        .image
        .with_tag(tag)
        .map_err(|e| Error::InvalidConfig(format!("tag {:?}: {}", tag, e)))?;
    tracing::debug!(image = %tagged, jobs = graph.len(), "assembling pipeline");

    let mut orchestrator = Orchestrator::new(config.service.as_str(), graph.clone(), credential, cancel)
        .with_teardown(Arc::clone(&components.target));

    for spec in graph.jobs() {
        let action: Arc<dyn JobAction> = match spec.kind {
            JobKind::Build => {
                let context = BuildContext::new(
                    config.context_dir(base),
                    &config.build.recipe,
                    config.image.clone(),
                    tag,
                )
                .args(resolve_env_map(&config.build.args)?);
                Arc::new(BuildJob::new(Arc::clone(&components.builder), context))
            }
            JobKind::Publish => Arc::new(PublishJob::new(Arc::clone(&components.registry), &host)),
            JobKind::Promote => {
                let alias = config.promote.as_deref().ok_or_else(|| {
                    Error::InvalidConfig("a promote job needs `promote: <tag>`".to_string())
                })?;
                Arc::new(PromoteJob::new(Arc::clone(&components.registry), &host, alias))
            }
            JobKind::Deploy => Arc::new(
                DeployJob::new(
                    Arc::clone(&components.target),
                    config.ports.clone(),
                    config.service.as_str(),
                )
                .replace(config.target.replace)
                .retry(config.retry.policy()),
            ),
            JobKind::Verify => Arc::new(VerifyJob::new(
                Arc::clone(&components.probe),
                config.verify.settings(),
            )),
        };
        orchestrator = orchestrator.with_action(spec.id.clone(), action);
    }

    Ok(orchestrator)
}
