// ABOUTME: BuildError: which stage failed, the tool's exit code, and the log tail.
// ABOUTME: The tail is kept for the report; it is never parsed.

use serde::Serialize;
use std::fmt;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BuildStage {
    /// Validating the context before the tool runs.
    Prepare,
    /// The external tool itself.
    Build,
    /// Reading the image id the tool wrote.
    Digest,
}

impl fmt::Display for BuildStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            BuildStage::Prepare => "prepare",
            BuildStage::Build => "build",
            BuildStage::Digest => "digest",
        })
    }
}

#[derive(Debug, Error)]
#[error("build failed during {stage}{}: {message}", .exit_code.map(|c| format!(" (exit code {c})")).unwrap_or_default())]
pub struct BuildError {
    pub stage: BuildStage,
    pub exit_code: Option<i32>,
    pub message: String,
    pub log_tail: Vec<String>,
}

impl BuildError {
    pub fn prepare(message: impl Into<String>) -> Self {
        Self {
            stage: BuildStage::Prepare,
            exit_code: None,
            message: message.into(),
            log_tail: Vec::new(),
        }
    }

    pub fn digest(message: impl Into<String>, log_tail: Vec<String>) -> Self {
        Self {
            stage: BuildStage::Digest,
            exit_code: None,
            message: message.into(),
            log_tail,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_stage_and_exit_code() {
        let err = BuildError {
            stage: BuildStage::Build,
            exit_code: Some(2),
            message: "docker exited unsuccessfully".into(),
            log_tail: vec!["step 3/7 failed".into()],
        };
        let msg = err.to_string();
        assert!(msg.contains("during build (exit code 2)"));
        assert!(!msg.contains("step 3/7"));
    }
}
