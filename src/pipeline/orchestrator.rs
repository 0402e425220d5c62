// ABOUTME: Runs the job graph: concurrent where independent, gated where dependent.
// ABOUTME: Failures skip dependents; cancellation skips everything not yet started.

use super::context::{JobContext, Outputs};
use super::error::JobError;
use super::graph::JobGraph;
use super::jobs::JobAction;
use super::report::{JobRecord, JobState, Outcome, PipelineReport};
use crate::cancel::CancelToken;
use crate::diagnostics::{Diagnostics, Warning};
use crate::registry::Credential;
use crate::target::{DeploymentTarget, RunError};
use crate::types::JobId;
use chrono::Utc;
use futures::FutureExt;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tokio::task::JoinSet;

type Finished = (JobId, Result<super::context::JobOutput, JobError>);

pub struct Orchestrator {
    name: String,
    graph: JobGraph,
    actions: HashMap<JobId, Arc<dyn JobAction>>,
    credential: Arc<Credential>,
    cancel: CancelToken,
    diagnostics: Arc<Mutex<Diagnostics>>,
    teardown: Vec<Arc<dyn DeploymentTarget>>,
}

impl Orchestrator {
    pub fn new(
        name: impl Into<String>,
        graph: JobGraph,
        credential: Arc<Credential>,
        cancel: CancelToken,
    ) -> Self {
        Self {
            name: name.into(),
            graph,
            actions: HashMap::new(),
            credential,
            cancel,
            diagnostics: Arc::default(),
            teardown: Vec::new(),
        }
    }

    /// Bind the work a job id performs.
    pub fn with_action(mut self, id: JobId, action: Arc<dyn JobAction>) -> Self {
        self.actions.insert(id, action);
        self
    }

    /// Tear `target` down once every job is terminal. Only ephemeral targets
    /// do anything on teardown.
    pub fn with_teardown(mut self, target: Arc<dyn DeploymentTarget>) -> Self {
        self.teardown.push(target);
        self
    }

    /// Record a warning raised while assembling the run.
    pub fn warn(&self, warning: Warning) {
        self.diagnostics.lock().warn(warning);
    }

    pub fn graph(&self) -> &JobGraph {
        &self.graph
    }

    pub async fn run(self) -> PipelineReport {
        let started_at = Utc::now();
        tracing::info!(pipeline = %self.name, jobs = self.graph.len(), "pipeline started");

        let mut records: Vec<JobRecord> = self
            .graph
            .jobs()
            .iter()
            .map(|spec| JobRecord::pending(spec.id.clone(), spec.kind))
            .collect();
        let position: HashMap<JobId, usize> = records
            .iter()
            .enumerate()
            .map(|(i, r)| (r.id.clone(), i))
            .collect();

        let outputs: Outputs = Arc::default();
        let mut running: JoinSet<Finished> = JoinSet::new();
        let mut seq: u64 = 0;
        let mut cancel_seen = false;

        loop {
            if !cancel_seen
                && self.cancel.is_cancelled()
                && records.iter().any(|r| !r.state.is_terminal())
            {
                cancel_seen = true;
                tracing::warn!(pipeline = %self.name, "cancellation requested");
                for record in records.iter_mut().filter(|r| r.state == JobState::Pending) {
                    record.skip("cancelled before start");
                }
            }

            if !cancel_seen {
                for spec in self.graph.jobs() {
                    let i = position[&spec.id];
                    if records[i].state != JobState::Pending {
                        continue;
                    }
                    let ready = spec
                        .needs
                        .iter()
                        .all(|dep| records[position[dep]].state == JobState::Succeeded);
                    if !ready {
                        continue;
                    }

                    seq += 1;
                    records[i].state = JobState::Running;
                    records[i].started_at = Some(Utc::now());
                    records[i].started_seq = Some(seq);
                    tracing::info!(job = %spec.id, kind = %spec.kind, "job started");

                    let ctx = JobContext::new(
                        spec.id.clone(),
                        self.graph.ancestors(&spec.id),
                        Arc::clone(&outputs),
                        Arc::clone(&self.credential),
                        self.cancel.clone(),
                        Arc::clone(&self.diagnostics),
                    );
                    let action = self.actions.get(&spec.id).cloned();
                    let id = spec.id.clone();
                    running.spawn(async move {
                        let Some(action) = action else {
                            return (id.clone(), Err(JobError::Unbound { job: id }));
                        };
                        let result = AssertUnwindSafe(action.run(&ctx)).catch_unwind().await;
                        let result = result.unwrap_or_else(|panic| {
                            Err(JobError::Panicked {
                                message: panic_message(panic.as_ref()),
                            })
                        });
                        (id, result)
                    });
                }
            }

            if running.is_empty() {
                break;
            }

            let joined = tokio::select! {
                joined = running.join_next() => joined,
                _ = self.cancel.cancelled(), if !cancel_seen => continue,
            };
            let Some(joined) = joined else { break };
            let (id, result) = match joined {
                Ok(finished) => finished,
                Err(e) => {
                    tracing::error!(error = %e, "job task ended abnormally");
                    continue;
                }
            };

            seq += 1;
            let i = position[&id];
            records[i].finished_at = Some(Utc::now());
            records[i].finished_seq = Some(seq);
            match result {
                Ok(output) => {
                    tracing::info!(job = %id, "{}", output);
                    records[i].state = JobState::Succeeded;
                    records[i].summary = Some(output.to_string());
                    outputs.lock().insert(id, output);
                }
                Err(err) => {
                    tracing::warn!(job = %id, error = %err, "job failed");
                    records[i].state = JobState::Failed;
                    records[i].error = Some(err.to_string());
                    records[i].error_kind = Some(err.kind());
                    records[i].diagnostic = err.diagnostic();
                    for dependent in self.graph.dependents(&id) {
                        let record = &mut records[position[&dependent]];
                        if record.state == JobState::Pending {
                            record.skip(format!("dependency {} failed", id));
                        }
                    }
                }
            }
        }

        // A task that died without reporting back leaves its job Running.
        for record in records.iter_mut() {
            match record.state {
                JobState::Running => {
                    record.state = JobState::Failed;
                    record.error = Some("job task ended without a result".to_string());
                }
                JobState::Pending => record.skip("never became ready"),
                _ => {}
            }
        }

        for target in &self.teardown {
            match target.teardown().await {
                Ok(gone) if !gone.is_empty() => {
                    tracing::debug!(host = %target.host(), count = gone.len(), "runner torn down")
                }
                Ok(_) => {}
                Err(RunError::Teardown { host, failures }) => {
                    let mut diagnostics = self.diagnostics.lock();
                    for failure in failures {
                        diagnostics.warn(Warning::teardown_failed(format!(
                            "teardown on {}: {}",
                            host, failure
                        )));
                    }
                }
                Err(e) => self.diagnostics.lock().warn(Warning::teardown_failed(format!(
                    "teardown on {} failed: {}",
                    target.host(),
                    e
                ))),
            }
        }

        let outcome = if cancel_seen {
            Outcome::Cancelled
        } else if records.iter().any(|r| r.state == JobState::Failed) {
            Outcome::Failed
        } else {
            Outcome::Succeeded
        };
        tracing::info!(pipeline = %self.name, %outcome, "pipeline finished");

        let warnings = std::mem::take(&mut *self.diagnostics.lock()).into_warnings();
        PipelineReport {
            pipeline: self.name,
            runner: gethostname::gethostname().to_string_lossy().into_owned(),
            started_at,
            finished_at: Utc::now(),
            outcome,
            jobs: records,
            warnings,
        }
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
