// ABOUTME: Run report: every job's terminal state, timing and failure tail.
// ABOUTME: Serialized as-is for JSON output.

use super::error::JobErrorKind;
use super::graph::JobKind;
use crate::diagnostics::Warning;
use crate::types::JobId;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum JobState {
    Pending,
    Running,
    Succeeded,
    Failed,
    Skipped,
}

impl JobState {
    pub fn is_terminal(self) -> bool {
        matches!(self, JobState::Succeeded | JobState::Failed | JobState::Skipped)
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            JobState::Pending => "pending",
            JobState::Running => "running",
            JobState::Succeeded => "succeeded",
            JobState::Failed => "failed",
            JobState::Skipped => "skipped",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    Succeeded,
    Failed,
    Cancelled,
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Outcome::Succeeded => "succeeded",
            Outcome::Failed => "failed",
            Outcome::Cancelled => "cancelled",
        })
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct JobRecord {
    pub id: JobId,
    pub kind: JobKind,
    pub state: JobState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
    /// Order in which jobs started, across the whole run.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_seq: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finished_seq: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip)]
    pub error_kind: Option<JobErrorKind>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub diagnostic: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub skip_reason: Option<String>,
}

impl JobRecord {
    pub(crate) fn pending(id: JobId, kind: JobKind) -> Self {
        Self {
            id,
            kind,
            state: JobState::Pending,
            started_at: None,
            finished_at: None,
            started_seq: None,
            finished_seq: None,
            summary: None,
            error: None,
            error_kind: None,
            diagnostic: Vec::new(),
            skip_reason: None,
        }
    }

    pub(crate) fn skip(&mut self, reason: impl Into<String>) {
        self.state = JobState::Skipped;
        self.skip_reason = Some(reason.into());
    }

    /// Wall time between start and finish, if the job ran.
    pub fn duration(&self) -> Option<chrono::Duration> {
        Some(self.finished_at? - self.started_at?)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PipelineReport {
    pub pipeline: String,
    /// Host the orchestrator ran on.
    pub runner: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub outcome: Outcome,
    pub jobs: Vec<JobRecord>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<Warning>,
}

impl PipelineReport {
    pub fn job(&self, id: &str) -> Option<&JobRecord> {
        self.jobs.iter().find(|j| j.id.as_str() == id)
    }

    pub fn state_of(&self, id: &str) -> Option<JobState> {
        self.job(id).map(|j| j.state)
    }

    pub fn failed(&self) -> impl Iterator<Item = &JobRecord> {
        self.jobs.iter().filter(|j| j.state == JobState::Failed)
    }

    pub fn skipped(&self) -> impl Iterator<Item = &JobRecord> {
        self.jobs.iter().filter(|j| j.state == JobState::Skipped)
    }

    /// Process exit code for this outcome: 0, 1, or 130 like SIGINT.
    pub fn exit_code(&self) -> i32 {
        match self.outcome {
            Outcome::Succeeded => 0,
            Outcome::Failed => 1,
            Outcome::Cancelled => 130,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unrun_jobs_omit_timing_fields() {
        let mut record = JobRecord::pending(JobId::new("deploy").unwrap(), JobKind::Deploy);
        record.skip("dependency publish failed");

        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["state"], "skipped");
        assert_eq!(json["skip_reason"], "dependency publish failed");
        assert!(json.get("started_at").is_none());
        assert!(json.get("diagnostic").is_none());
        assert!(record.duration().is_none());
    }
}
