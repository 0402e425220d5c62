// ABOUTME: Job failure type with SNAFU pattern.
// ABOUTME: Unifies component errors and keeps the diagnostic tail for the report.

use snafu::Snafu;

use crate::build::BuildError;
use crate::probe::{Endpoint, ProbeReport, Verdict};
use crate::registry::RegistryError;
use crate::target::RunError;
use crate::types::JobId;

/// Why a single job ended in Failed.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum JobError {
    #[snafu(display("{source}"))]
    Build { source: BuildError },

    #[snafu(display("{source}"))]
    Registry { source: RegistryError },

    #[snafu(display("{source}"))]
    Deploy { source: RunError },

    #[snafu(display("{endpoint} did not become healthy: {verdict} after {} attempts", report.attempts.len()))]
    Verification {
        endpoint: Endpoint,
        verdict: Verdict,
        report: ProbeReport,
    },

    #[snafu(display("no upstream job produced {needed}"))]
    MissingInput { needed: &'static str },

    #[snafu(display("cancelled while running"))]
    Cancelled,

    #[snafu(display("no action is bound to job {job}"))]
    Unbound { job: JobId },

    #[snafu(display("job panicked: {message}"))]
    Panicked { message: String },
}

/// Error kind for programmatic handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobErrorKind {
    Build,
    Registry,
    Deploy,
    Verification,
    Cancelled,
    /// The pipeline itself is wired wrong or a job misbehaved.
    Internal,
}

impl JobError {
    pub fn kind(&self) -> JobErrorKind {
        match self {
            JobError::Build { .. } => JobErrorKind::Build,
            JobError::Registry { source } => match source {
                crate::registry::RegistryError::Cancelled(_) => JobErrorKind::Cancelled,
                _ => JobErrorKind::Registry,
            },
            JobError::Deploy { .. } => JobErrorKind::Deploy,
            JobError::Verification { .. } => JobErrorKind::Verification,
            JobError::Cancelled => JobErrorKind::Cancelled,
            JobError::MissingInput { .. } | JobError::Unbound { .. } | JobError::Panicked { .. } => {
                JobErrorKind::Internal
            }
        }
    }

    /// Lines worth showing under the failure: the build log tail or the
    /// probe's attempt sequence.
    pub fn diagnostic(&self) -> Vec<String> {
        match self {
            JobError::Build { source } => source.log_tail.clone(),
            JobError::Verification { report, .. } => report.lines(),
            _ => Vec::new(),
        }
    }
}

impl From<BuildError> for JobError {
    fn from(source: BuildError) -> Self {
        JobError::Build { source }
    }
}

impl From<RegistryError> for JobError {
    fn from(source: RegistryError) -> Self {
        JobError::Registry { source }
    }
}

impl From<RunError> for JobError {
    fn from(source: RunError) -> Self {
        JobError::Deploy { source }
    }
}
