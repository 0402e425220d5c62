// ABOUTME: Trigger section: which branches may run the pipeline.
// ABOUTME: No trigger, or no branch given, means always run.

use super::deserialize::deserialize_branches;
use nonempty::NonEmpty;
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct TriggerConfig {
    #[serde(deserialize_with = "deserialize_branches")]
    pub branches: NonEmpty<String>,
}

impl TriggerConfig {
    /// `release/*` matches any branch under `release/`.
    pub fn allows(&self, branch: &str) -> bool {
        self.branches.iter().any(|pattern| match pattern.strip_suffix('*') {
            Some(prefix) => branch.starts_with(prefix),
            None => pattern == branch,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_and_prefix_patterns() {
        let trigger: TriggerConfig =
            serde_yaml::from_str("branches: [main, 'release/*']").unwrap();
        assert!(trigger.allows("main"));
        assert!(trigger.allows("release/1.2"));
        assert!(!trigger.allows("feature/x"));
    }

    #[test]
    fn empty_branch_list_is_rejected() {
        assert!(serde_yaml::from_str::<TriggerConfig>("branches: []").is_err());
    }
}
