// ABOUTME: The job graph: validated DAG of typed jobs.
// ABOUTME: Rejects cycles, dangling edges, and jobs whose input nothing upstream produces.

use crate::types::JobId;
use serde::Serialize;
use std::collections::{BTreeSet, HashMap, VecDeque};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum JobKind {
    Build,
    Publish,
    Promote,
    Deploy,
    Verify,
}

impl JobKind {
    /// Kinds that satisfy this kind's input, any one of them being enough.
    pub fn inputs(self) -> &'static [JobKind] {
        match self {
            JobKind::Build => &[],
            JobKind::Publish => &[JobKind::Build],
            JobKind::Promote => &[JobKind::Publish],
            JobKind::Deploy => &[JobKind::Publish, JobKind::Build],
            JobKind::Verify => &[JobKind::Deploy],
        }
    }

    fn input_name(self) -> &'static str {
        match self {
            JobKind::Build => "nothing",
            JobKind::Publish => "a built artifact",
            JobKind::Promote => "a published artifact",
            JobKind::Deploy => "a built or published artifact",
            JobKind::Verify => "a deployed instance",
        }
    }
}

impl fmt::Display for JobKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            JobKind::Build => "build",
            JobKind::Publish => "publish",
            JobKind::Promote => "promote",
            JobKind::Deploy => "deploy",
            JobKind::Verify => "verify",
        })
    }
}

impl FromStr for JobKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "build" => Ok(JobKind::Build),
            "publish" => Ok(JobKind::Publish),
            "promote" => Ok(JobKind::Promote),
            "deploy" => Ok(JobKind::Deploy),
            "verify" => Ok(JobKind::Verify),
            other => Err(other.to_string()),
        }
    }
}

/// Why a pipeline definition was rejected before anything ran.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DefinitionError {
    #[error("pipeline has no jobs")]
    Empty,

    #[error("invalid job id {id:?}: {reason}")]
    InvalidId { id: String, reason: String },

    #[error("job {0} is defined more than once")]
    Duplicate(JobId),

    #[error("job {job} needs unknown job {missing}")]
    UnknownDependency { job: JobId, missing: String },

    #[error("job {0} depends on itself")]
    SelfDependency(JobId),

    #[error("jobs form a cycle: {}", .0.iter().map(JobId::as_str).collect::<Vec<_>>().join(", "))]
    Cycle(Vec<JobId>),

    #[error("job {job} uses unknown kind {kind:?} (expected build, publish, promote, deploy or verify)")]
    UnknownKind { job: String, kind: String },

    #[error("{kind} job {job} needs {needed} but no upstream job produces one")]
    MissingInput {
        job: JobId,
        kind: JobKind,
        needed: &'static str,
    },
}

/// Parse a job id, reporting failure as a definition error.
pub fn job_id(raw: &str) -> Result<JobId, DefinitionError> {
    JobId::new(raw).map_err(|e| DefinitionError::InvalidId {
        id: raw.to_string(),
        reason: e.to_string(),
    })
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobSpec {
    pub id: JobId,
    pub kind: JobKind,
    pub needs: Vec<JobId>,
}

impl JobSpec {
    pub fn new(id: JobId, kind: JobKind) -> Self {
        Self {
            id,
            kind,
            needs: Vec::new(),
        }
    }

    pub fn needs(mut self, dependency: JobId) -> Self {
        self.needs.push(dependency);
        self
    }
}

/// A validated job DAG, stored in a topological order.
#[derive(Debug, Clone)]
pub struct JobGraph {
    jobs: Vec<JobSpec>,
    index: HashMap<JobId, usize>,
}

impl JobGraph {
    pub fn new(specs: Vec<JobSpec>) -> Result<Self, DefinitionError> {
        if specs.is_empty() {
            return Err(DefinitionError::Empty);
        }

        let mut declared: HashMap<JobId, usize> = HashMap::new();
        for (i, spec) in specs.iter().enumerate() {
            if declared.insert(spec.id.clone(), i).is_some() {
                return Err(DefinitionError::Duplicate(spec.id.clone()));
            }
        }
        for spec in &specs {
            for dep in &spec.needs {
                if dep == &spec.id {
                    return Err(DefinitionError::SelfDependency(spec.id.clone()));
                }
                if !declared.contains_key(dep) {
                    return Err(DefinitionError::UnknownDependency {
                        job: spec.id.clone(),
                        missing: dep.to_string(),
                    });
                }
            }
        }

        let order = topological_order(&specs, &declared)?;
        let mut slots: Vec<Option<JobSpec>> = specs.into_iter().map(Some).collect();
        let jobs: Vec<JobSpec> = order.into_iter().filter_map(|i| slots[i].take()).collect();
        let index = jobs
            .iter()
            .enumerate()
            .map(|(i, spec)| (spec.id.clone(), i))
            .collect();

        let graph = Self { jobs, index };
        for spec in &graph.jobs {
            let inputs = spec.kind.inputs();
            if !inputs.is_empty() && graph.nearest_ancestor(&spec.id, inputs).is_none() {
                return Err(DefinitionError::MissingInput {
                    job: spec.id.clone(),
                    kind: spec.kind,
                    needed: spec.kind.input_name(),
                });
            }
        }
        Ok(graph)
    }

    /// The usual chain: build, publish, optional promote, deploy, verify.
    pub fn standard(promote: bool) -> Result<Self, DefinitionError> {
        let mut specs = vec![
            JobSpec::new(job_id("build")?, JobKind::Build),
            JobSpec::new(job_id("publish")?, JobKind::Publish).needs(job_id("build")?),
        ];
        if promote {
            specs.push(JobSpec::new(job_id("promote")?, JobKind::Promote).needs(job_id("publish")?));
        }
        specs.push(JobSpec::new(job_id("deploy")?, JobKind::Deploy).needs(job_id("publish")?));
        specs.push(JobSpec::new(job_id("verify")?, JobKind::Verify).needs(job_id("deploy")?));
        Self::new(specs)
    }

    /// Jobs in topological order; ties keep declaration order.
    pub fn jobs(&self) -> &[JobSpec] {
        &self.jobs
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    pub fn get(&self, id: &JobId) -> Option<&JobSpec> {
        self.index.get(id).map(|&i| &self.jobs[i])
    }

    /// Every ancestor of `id`, nearest first (breadth-first over `needs`).
    pub fn ancestors(&self, id: &JobId) -> Vec<JobId> {
        let mut seen = BTreeSet::new();
        let mut out = Vec::new();
        let mut queue: VecDeque<&JobId> = VecDeque::new();
        if let Some(spec) = self.get(id) {
            queue.extend(spec.needs.iter());
        }
        while let Some(next) = queue.pop_front() {
            if !seen.insert(next.clone()) {
                continue;
            }
            out.push(next.clone());
            if let Some(spec) = self.get(next) {
                queue.extend(spec.needs.iter());
            }
        }
        out
    }

    /// Nearest ancestor whose kind is one of `kinds`.
    pub fn nearest_ancestor(&self, id: &JobId, kinds: &[JobKind]) -> Option<JobId> {
        self.ancestors(id)
            .into_iter()
            .find(|a| self.get(a).is_some_and(|spec| kinds.contains(&spec.kind)))
    }

    /// Every job that transitively needs `id`.
    pub fn dependents(&self, id: &JobId) -> BTreeSet<JobId> {
        let mut found = BTreeSet::new();
        let mut frontier = vec![id.clone()];
        while let Some(current) = frontier.pop() {
            for spec in &self.jobs {
                if spec.needs.contains(&current) && found.insert(spec.id.clone()) {
                    frontier.push(spec.id.clone());
                }
            }
        }
        found
    }
}

// Kahn's algorithm; the ready set is ordered by declaration index.
fn topological_order(
    specs: &[JobSpec],
    declared: &HashMap<JobId, usize>,
) -> Result<Vec<usize>, DefinitionError> {
    let mut indegree: Vec<usize> = specs.iter().map(|s| s.needs.len()).collect();
    let mut children: Vec<Vec<usize>> = vec![Vec::new(); specs.len()];
    for (i, spec) in specs.iter().enumerate() {
        for dep in &spec.needs {
            children[declared[dep]].push(i);
        }
    }

    let mut ready: BTreeSet<usize> = (0..specs.len()).filter(|&i| indegree[i] == 0).collect();
    let mut order = Vec::with_capacity(specs.len());
    while let Some(i) = ready.pop_first() {
        order.push(i);
        for &child in &children[i] {
            indegree[child] -= 1;
            if indegree[child] == 0 {
                ready.insert(child);
            }
        }
    }

    if order.len() < specs.len() {
        let stuck = (0..specs.len())
            .filter(|&i| indegree[i] > 0)
            .map(|i| specs[i].id.clone())
            .collect();
        return Err(DefinitionError::Cycle(stuck));
    }
    Ok(order)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(s: &str) -> JobId {
        JobId::new(s).unwrap()
    }

    #[test]
    fn standard_graph_orders_the_chain() {
        let graph = JobGraph::standard(true).unwrap();
        let order: Vec<_> = graph.jobs().iter().map(|j| j.id.as_str()).collect();
        assert_eq!(order, ["build", "publish", "promote", "deploy", "verify"]);
    }

    #[test]
    fn declaration_order_is_not_required() {
        let graph = JobGraph::new(vec![
            JobSpec::new(id("publish"), JobKind::Publish).needs(id("build")),
            JobSpec::new(id("build"), JobKind::Build),
        ])
        .unwrap();
        assert_eq!(graph.jobs()[0].id, id("build"));
    }

    #[test]
    fn rejects_empty_and_duplicates() {
        assert_eq!(JobGraph::new(vec![]).unwrap_err(), DefinitionError::Empty);

        let err = JobGraph::new(vec![
            JobSpec::new(id("build"), JobKind::Build),
            JobSpec::new(id("build"), JobKind::Build),
        ])
        .unwrap_err();
        assert_eq!(err, DefinitionError::Duplicate(id("build")));
    }

    #[test]
    fn rejects_unknown_and_self_dependencies() {
        let err = JobGraph::new(vec![JobSpec::new(id("build"), JobKind::Build).needs(id("fetch"))])
            .unwrap_err();
        assert!(matches!(err, DefinitionError::UnknownDependency { .. }));

        let err = JobGraph::new(vec![JobSpec::new(id("build"), JobKind::Build).needs(id("build"))])
            .unwrap_err();
        assert_eq!(err, DefinitionError::SelfDependency(id("build")));
    }

    #[test]
    fn rejects_cycles() {
        let err = JobGraph::new(vec![
            JobSpec::new(id("a"), JobKind::Build).needs(id("b")),
            JobSpec::new(id("b"), JobKind::Build).needs(id("a")),
        ])
        .unwrap_err();
        assert_eq!(err, DefinitionError::Cycle(vec![id("a"), id("b")]));
    }

    #[test]
    fn deploy_needs_an_artifact_upstream() {
        let err = JobGraph::new(vec![JobSpec::new(id("deploy"), JobKind::Deploy)]).unwrap_err();
        assert!(matches!(
            err,
            DefinitionError::MissingInput {
                kind: JobKind::Deploy,
                ..
            }
        ));

        // A build alone is enough for a local deploy.
        JobGraph::new(vec![
            JobSpec::new(id("build"), JobKind::Build),
            JobSpec::new(id("deploy"), JobKind::Deploy).needs(id("build")),
        ])
        .unwrap();
    }

    #[test]
    fn ancestors_are_nearest_first() {
        let graph = JobGraph::standard(false).unwrap();
        let ancestors = graph.ancestors(&id("verify"));
        assert_eq!(ancestors, vec![id("deploy"), id("publish"), id("build")]);
        assert_eq!(
            graph.nearest_ancestor(&id("deploy"), JobKind::Deploy.inputs()),
            Some(id("publish"))
        );
    }

    #[test]
    fn dependents_are_transitive() {
        let graph = JobGraph::standard(true).unwrap();
        let deps: Vec<_> = graph.dependents(&id("publish")).into_iter().collect();
        assert_eq!(deps, vec![id("deploy"), id("promote"), id("verify")]);
    }

    #[test]
    fn kind_parses_from_config_names() {
        assert_eq!("promote".parse::<JobKind>(), Ok(JobKind::Promote));
        assert_eq!("lint".parse::<JobKind>(), Err("lint".to_string()));
    }
}
