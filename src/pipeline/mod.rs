// ABOUTME: Pipeline orchestration: a DAG of build, publish, promote, deploy and verify jobs.
// ABOUTME: Jobs run as soon as their dependencies succeed; failures skip dependents.

mod assemble;
mod context;
mod error;
mod graph;
mod jobs;
mod orchestrator;
mod report;

pub use assemble::{Components, assemble};
pub use context::{Deployable, JobContext, JobOutput};
pub use error::{JobError, JobErrorKind};
pub use graph::{DefinitionError, JobGraph, JobKind, JobSpec, job_id};
pub use jobs::{
    BuildJob, DeployJob, JobAction, PromoteJob, PublishJob, VerifyJob, VerifySettings,
};
pub use orchestrator::Orchestrator;
pub use report::{JobRecord, JobState, Outcome, PipelineReport};
