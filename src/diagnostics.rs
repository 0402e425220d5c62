// ABOUTME: Diagnostics accumulator for non-fatal warnings during a pipeline run.
// ABOUTME: Collects warnings that shouldn't fail the run but belong in the report.

use serde::Serialize;

/// Collects non-fatal warnings during a pipeline run.
#[derive(Debug, Default)]
pub struct Diagnostics {
    warnings: Vec<Warning>,
}

impl Diagnostics {
    /// Record a warning, auto-logging it via tracing.
    pub fn warn(&mut self, warning: Warning) {
        tracing::warn!("{}", warning.message);
        self.warnings.push(warning);
    }

    pub fn warnings(&self) -> &[Warning] {
        &self.warnings
    }

    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }

    pub fn into_warnings(self) -> Vec<Warning> {
        self.warnings
    }
}

/// A non-fatal warning collected during a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Warning {
    pub kind: WarningKind,
    pub message: String,
}

impl Warning {
    /// An ephemeral runner removed a deployed instance when it ended.
    pub fn instance_torn_down(message: impl Into<String>) -> Self {
        Self {
            kind: WarningKind::InstanceTornDown,
            message: message.into(),
        }
    }

    /// An ephemeral runner could not remove an instance; it may outlive the run.
    pub fn teardown_failed(message: impl Into<String>) -> Self {
        Self {
            kind: WarningKind::TeardownFailed,
            message: message.into(),
        }
    }

    /// Failed to cleanly disconnect an SSH session.
    pub fn ssh_disconnect(message: impl Into<String>) -> Self {
        Self {
            kind: WarningKind::SshDisconnect,
            message: message.into(),
        }
    }

    /// The registry credential could not be resolved and anonymous access is used.
    pub fn anonymous_registry(message: impl Into<String>) -> Self {
        Self {
            kind: WarningKind::AnonymousRegistry,
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WarningKind {
    InstanceTornDown,
    TeardownFailed,
    SshDisconnect,
    AnonymousRegistry,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn diagnostics_starts_empty() {
        let diag = Diagnostics::default();
        assert!(!diag.has_warnings());
        assert!(diag.warnings().is_empty());
    }

    #[test]
    fn diagnostics_collects_warnings() {
        let mut diag = Diagnostics::default();

        diag.warn(Warning::instance_torn_down("web removed with the runner"));
        diag.warn(Warning::ssh_disconnect("connection reset"));

        assert!(diag.has_warnings());
        assert_eq!(diag.into_warnings().len(), 2);
    }

    #[test]
    fn warnings_serialize_with_snake_case_kind() {
        let json = serde_json::to_string(&Warning::instance_torn_down("gone")).unwrap();
        assert_eq!(json, r#"{"kind":"instance_torn_down","message":"gone"}"#);
    }
}
