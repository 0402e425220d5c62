// ABOUTME: Custom job graph section, kept in declaration order.
// ABOUTME: Converted to a validated JobGraph when the config loads.

use crate::pipeline::{DefinitionError, JobGraph, JobKind, JobSpec, job_id};
use serde::de::{MapAccess, Visitor};
use serde::{Deserialize, Deserializer};
use std::fmt;

#[derive(Debug, Clone, Deserialize)]
pub struct JobEntry {
    pub uses: String,
    #[serde(default)]
    pub needs: Vec<String>,
}

/// Job entries as written, duplicates included, so the graph can report them.
#[derive(Debug, Clone, Default)]
pub struct JobsConfig(pub Vec<(String, JobEntry)>);

impl JobsConfig {
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn graph(&self) -> Result<JobGraph, DefinitionError> {
        let specs = self
            .0
            .iter()
            .map(|(name, entry)| {
                let id = job_id(name)?;
                let kind = entry
                    .uses
                    .parse::<JobKind>()
                    .map_err(|kind| DefinitionError::UnknownKind {
                        job: name.clone(),
                        kind,
                    })?;
                let needs = entry
                    .needs
                    .iter()
                    .map(|dep| {
                        job_id(dep).map_err(|_| DefinitionError::UnknownDependency {
                            job: id.clone(),
                            missing: dep.clone(),
                        })
                    })
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(JobSpec { id, kind, needs })
            })
            .collect::<Result<Vec<_>, DefinitionError>>()?;
        JobGraph::new(specs)
    }

    pub fn uses(&self, kind: JobKind) -> bool {
        self.0
            .iter()
            .any(|(_, entry)| entry.uses.parse::<JobKind>() == Ok(kind))
    }
}

impl<'de> Deserialize<'de> for JobsConfig {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct EntriesVisitor;

        impl<'de> Visitor<'de> for EntriesVisitor {
            type Value = JobsConfig;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a map of job ids to job definitions")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Self::Value, A::Error> {
                let mut entries = Vec::new();
                while let Some((name, entry)) = map.next_entry::<String, JobEntry>()? {
                    entries.push((name, entry));
                }
                Ok(JobsConfig(entries))
            }
        }

        deserializer.deserialize_map(EntriesVisitor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keeps_declaration_order() {
        let jobs: JobsConfig = serde_yaml::from_str(
            "zeta: { uses: build }\nalpha: { uses: publish, needs: [zeta] }\n",
        )
        .unwrap();
        let names: Vec<_> = jobs.0.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(names, ["zeta", "alpha"]);
        assert_eq!(jobs.graph().unwrap().len(), 2);
    }

    #[test]
    fn unknown_kind_is_a_definition_error() {
        let jobs: JobsConfig = serde_yaml::from_str("lint: { uses: lint }\n").unwrap();
        assert_eq!(
            jobs.graph().unwrap_err(),
            DefinitionError::UnknownKind {
                job: "lint".into(),
                kind: "lint".into()
            }
        );
    }
}
