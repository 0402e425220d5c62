// ABOUTME: What a running job can see: its ancestors' outputs, the credential, the cancel signal.
// ABOUTME: Outputs are typed; a job reads the one its nearest matching ancestor produced.

use crate::cancel::CancelToken;
use crate::diagnostics::Diagnostics;
use crate::probe::ProbeReport;
use crate::registry::{Credential, PublishedRef};
use crate::target::DeployedInstance;
use crate::types::{ArtifactReference, JobId};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// What a succeeded job hands downstream.
#[derive(Debug, Clone)]
pub enum JobOutput {
    Artifact(ArtifactReference),
    Published(PublishedRef),
    Promoted(PublishedRef),
    Deployed(DeployedInstance),
    Verified(ProbeReport),
}

impl fmt::Display for JobOutput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobOutput::Artifact(a) => write!(f, "built {}", a),
            JobOutput::Published(p) => write!(f, "pushed {}", p.artifact),
            JobOutput::Promoted(p) => write!(f, "{} now points at {}", p.artifact.tagged(), p.digest()),
            JobOutput::Deployed(i) => write!(
                f,
                "{} ({}) on {}",
                i.name,
                i.id.short(),
                i.host
            ),
            JobOutput::Verified(r) => write!(f, "{} after {} attempts", r.verdict, r.attempts.len()),
        }
    }
}

pub(crate) type Outputs = Arc<Mutex<HashMap<JobId, JobOutput>>>;

/// A deployable reference: pinned if it went through a registry, tagged if
/// it only exists in the local daemon.
#[derive(Debug, Clone)]
pub enum Deployable {
    Published(PublishedRef),
    Local(ArtifactReference),
}

pub struct JobContext {
    job: JobId,
    ancestors: Vec<JobId>,
    outputs: Outputs,
    credential: Arc<Credential>,
    cancel: CancelToken,
    diagnostics: Arc<Mutex<Diagnostics>>,
}

impl JobContext {
    pub(crate) fn new(
        job: JobId,
        ancestors: Vec<JobId>,
        outputs: Outputs,
        credential: Arc<Credential>,
        cancel: CancelToken,
        diagnostics: Arc<Mutex<Diagnostics>>,
    ) -> Self {
        Self {
            job,
            ancestors,
            outputs,
            credential,
            cancel,
            diagnostics,
        }
    }

    pub fn job(&self) -> &JobId {
        &self.job
    }

    pub fn credential(&self) -> Arc<Credential> {
        Arc::clone(&self.credential)
    }

    pub fn cancel(&self) -> &CancelToken {
        &self.cancel
    }

    pub fn diagnostics(&self) -> Arc<Mutex<Diagnostics>> {
        Arc::clone(&self.diagnostics)
    }

    fn nearest<T>(&self, pick: impl Fn(&JobOutput) -> Option<T>) -> Option<T> {
        let outputs = self.outputs.lock();
        self.ancestors
            .iter()
            .filter_map(|id| outputs.get(id))
            .find_map(pick)
    }

    pub fn artifact(&self) -> Option<ArtifactReference> {
        self.nearest(|o| match o {
            JobOutput::Artifact(a) => Some(a.clone()),
            _ => None,
        })
    }

    pub fn published(&self) -> Option<PublishedRef> {
        self.nearest(|o| match o {
            JobOutput::Published(p) => Some(p.clone()),
            _ => None,
        })
    }

    /// The nearest publish, or failing that the nearest build.
    pub fn deployable(&self) -> Option<Deployable> {
        self.nearest(|o| match o {
            JobOutput::Published(p) => Some(Deployable::Published(p.clone())),
            JobOutput::Artifact(a) => Some(Deployable::Local(a.clone())),
            _ => None,
        })
    }

    pub fn instance(&self) -> Option<DeployedInstance> {
        self.nearest(|o| match o {
            JobOutput::Deployed(i) => Some(i.clone()),
            _ => None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Digest, ImageRef};

    fn id(s: &str) -> JobId {
        JobId::new(s).unwrap()
    }

    #[test]
    fn nearest_ancestor_output_wins() {
        let image = ImageRef::parse("registry.local/acme/web").unwrap();
        let old = ArtifactReference::new(&image, "1", Digest::parse("sha:aaa").unwrap());
        let new = ArtifactReference::new(&image, "2", Digest::parse("sha:bbb").unwrap());

        let outputs: Outputs = Arc::default();
        outputs.lock().insert(id("far"), JobOutput::Artifact(old));
        outputs.lock().insert(id("near"), JobOutput::Artifact(new.clone()));
        outputs.lock().insert(id("unrelated"), JobOutput::Artifact(new.clone()));

        let ctx = JobContext::new(
            id("publish"),
            vec![id("near"), id("far")],
            outputs,
            Arc::new(Credential::anonymous("registry.local")),
            CancelToken::new(),
            Arc::default(),
        );
        assert_eq!(ctx.artifact(), Some(new));
        assert!(ctx.published().is_none());
        assert!(matches!(ctx.deployable(), Some(Deployable::Local(_))));
    }
}
