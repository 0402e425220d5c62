// ABOUTME: The five job kinds bound to their components.
// ABOUTME: Each reads its input from the job context and returns a typed output.

use super::context::{Deployable, JobContext, JobOutput};
use super::error::{CancelledSnafu, JobError, MissingInputSnafu};
use crate::build::{BuildContext, Builder};
use crate::diagnostics::Warning;
use crate::probe::{Endpoint, Probe, Verdict};
use crate::registry::RegistryClient;
use crate::retry::{RetryError, RetryPolicy};
use crate::runtime::PortMapping;
use crate::target::{DeploymentTarget, RunError};
use crate::types::ImageRef;
use async_trait::async_trait;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

/// One unit of pipeline work. Never retried by the orchestrator.
#[async_trait]
pub trait JobAction: Send + Sync {
    async fn run(&self, ctx: &JobContext) -> Result<JobOutput, JobError>;
}

// Race `work` against the cancel signal; dropping `work` is the interruption.
async fn or_cancelled<T>(
    ctx: &JobContext,
    work: impl Future<Output = Result<T, JobError>>,
) -> Result<T, JobError> {
    tokio::select! {
        result = work => result,
        _ = ctx.cancel().cancelled() => CancelledSnafu.fail(),
    }
}

pub struct BuildJob {
    builder: Arc<dyn Builder>,
    context: BuildContext,
}

impl BuildJob {
    pub fn new(builder: Arc<dyn Builder>, context: BuildContext) -> Self {
        Self { builder, context }
    }
}

#[async_trait]
impl JobAction for BuildJob {
    async fn run(&self, ctx: &JobContext) -> Result<JobOutput, JobError> {
        let context = self.context.clone();
        let artifact = or_cancelled(ctx, async {
            self.builder.build(context).await.map_err(JobError::from)
        })
        .await?;
        Ok(JobOutput::Artifact(artifact))
    }
}

pub struct PublishJob {
    registry: Arc<dyn RegistryClient>,
    host: String,
}

impl PublishJob {
    pub fn new(registry: Arc<dyn RegistryClient>, host: impl Into<String>) -> Self {
        Self {
            registry,
            host: host.into(),
        }
    }
}

#[async_trait]
impl JobAction for PublishJob {
    async fn run(&self, ctx: &JobContext) -> Result<JobOutput, JobError> {
        let artifact = ctx.artifact().ok_or_else(|| {
            MissingInputSnafu {
                needed: "a built artifact",
            }
            .build()
        })?;
        let session = self.registry.authenticate(&self.host, ctx.credential()).await?;
        let published = self.registry.push(&session, &artifact).await?;
        Ok(JobOutput::Published(published))
    }
}

pub struct PromoteJob {
    registry: Arc<dyn RegistryClient>,
    host: String,
    tag: String,
}

impl PromoteJob {
    pub fn new(registry: Arc<dyn RegistryClient>, host: impl Into<String>, tag: impl Into<String>) -> Self {
        Self {
            registry,
            host: host.into(),
            tag: tag.into(),
        }
    }
}

#[async_trait]
impl JobAction for PromoteJob {
    async fn run(&self, ctx: &JobContext) -> Result<JobOutput, JobError> {
        let published = ctx.published().ok_or_else(|| {
            MissingInputSnafu {
                needed: "a published artifact",
            }
            .build()
        })?;
        let session = self.registry.authenticate(&self.host, ctx.credential()).await?;
        let promoted = self.registry.promote(&session, &published, &self.tag).await?;
        Ok(JobOutput::Promoted(promoted))
    }
}

pub struct DeployJob {
    target: Arc<dyn DeploymentTarget>,
    ports: Vec<PortMapping>,
    name: String,
    replace: bool,
    retry: RetryPolicy,
}

impl DeployJob {
    pub fn new(target: Arc<dyn DeploymentTarget>, ports: Vec<PortMapping>, name: impl Into<String>) -> Self {
        Self {
            target,
            ports,
            name: name.into(),
            replace: false,
            retry: RetryPolicy::default(),
        }
    }

    /// Backoff for transient pull failures on the target.
    pub fn retry(mut self, policy: RetryPolicy) -> Self {
        self.retry = policy;
        self
    }

    async fn pull(&self, ctx: &JobContext, reference: &ImageRef) -> Result<(), JobError> {
        let auth = ctx.credential().auth();
        self.retry
            .run("pull", ctx.cancel(), |_| {
                let auth = auth.as_ref();
                async move { self.target.pull(reference, auth).await }
            })
            .await
            .map_err(|e| match e {
                RetryError::Permanent(err) => JobError::from(err),
                RetryError::Exhausted { attempts, last } => JobError::from(RunError::PullExhausted {
                    reference: reference.to_string(),
                    attempts,
                    last: Box::new(last),
                }),
                RetryError::Cancelled { .. } => JobError::Cancelled,
            })
    }

    /// Stop whatever runs under the same name first instead of failing.
    pub fn replace(mut self, replace: bool) -> Self {
        self.replace = replace;
        self
    }
}

#[async_trait]
impl JobAction for DeployJob {
    async fn run(&self, ctx: &JobContext) -> Result<JobOutput, JobError> {
        let reference = match ctx.deployable() {
            Some(Deployable::Published(published)) => {
                let pinned = published.pinned();
                self.pull(ctx, &pinned).await?;
                pinned
            }
            Some(Deployable::Local(artifact)) => artifact.tagged(),
            None => {
                return MissingInputSnafu {
                    needed: "a built or published artifact",
                }
                .fail();
            }
        };

        if ctx.cancel().is_cancelled() {
            return CancelledSnafu.fail();
        }
        if self.replace && self.target.stop_named(&self.name).await? {
            tracing::info!(container = %self.name, "stopped previous container");
        }

        let instance = self.target.run(&reference, &self.ports, &self.name).await?;

        if self.target.is_ephemeral() {
            let diagnostics = ctx.diagnostics();
            let job = ctx.job().clone();
            let id = instance.id.clone();
            self.target.on_teardown(Box::new(move |instances| {
                let mut diagnostics = diagnostics.lock();
                for gone in instances.iter().filter(|i| i.id == id) {
                    diagnostics.warn(Warning::instance_torn_down(format!(
                        "{} ({}) deployed by job {} was removed when the runner on {} ended",
                        gone.name,
                        gone.id.short(),
                        job,
                        gone.host
                    )));
                }
            }))?;
        }

        Ok(JobOutput::Deployed(instance))
    }
}

/// Probe settings for a verify job.
#[derive(Debug, Clone)]
pub struct VerifySettings {
    pub path: String,
    /// Defaults to the deployed instance's host.
    pub host: Option<String>,
    /// Defaults to the instance's first published port.
    pub port: Option<u16>,
    pub timeout: Duration,
    pub interval: Duration,
}

impl Default for VerifySettings {
    fn default() -> Self {
        Self {
            path: "/".to_string(),
            host: None,
            port: None,
            timeout: Duration::from_secs(10),
            interval: Duration::from_secs(1),
        }
    }
}

pub struct VerifyJob {
    probe: Arc<dyn Probe>,
    settings: VerifySettings,
}

impl VerifyJob {
    pub fn new(probe: Arc<dyn Probe>, settings: VerifySettings) -> Self {
        Self { probe, settings }
    }
}

#[async_trait]
impl JobAction for VerifyJob {
    async fn run(&self, ctx: &JobContext) -> Result<JobOutput, JobError> {
        let instance = ctx.instance().ok_or_else(|| {
            MissingInputSnafu {
                needed: "a deployed instance",
            }
            .build()
        })?;
        let port = self
            .settings
            .port
            .or_else(|| instance.primary_port())
            .ok_or_else(|| {
                MissingInputSnafu {
                    needed: "a published port to probe",
                }
                .build()
            })?;
        let host = self.settings.host.as_deref().unwrap_or(&instance.host);
        let endpoint = Endpoint::new(host, port, self.settings.path.as_str());

        let report = or_cancelled(ctx, async {
            Ok::<_, JobError>(
                self.probe
                    .check(&endpoint, self.settings.timeout, self.settings.interval)
                    .await,
            )
        })
        .await?;

        if report.verdict == Verdict::Healthy {
            Ok(JobOutput::Verified(report))
        } else {
            Err(JobError::Verification {
                endpoint,
                verdict: report.verdict,
                report,
            })
        }
    }
}
