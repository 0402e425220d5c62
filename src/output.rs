// ABOUTME: Output formatting for CLI feedback.
// ABOUTME: Supports normal, quiet (CI), and JSON output modes.

use crate::pipeline::{JobState, PipelineReport};
use serde::Serialize;
use std::time::Instant;

/// Output mode for CLI feedback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    /// Human-friendly output with progress messages
    Normal,
    /// Minimal output for CI (only final result)
    Quiet,
    /// JSON for scripting
    Json,
}

/// Handles CLI output based on the configured mode.
pub struct Output {
    mode: OutputMode,
    start_time: Option<Instant>,
}

impl Output {
    pub fn new(mode: OutputMode) -> Self {
        Self {
            mode,
            start_time: None,
        }
    }

    pub fn mode(&self) -> OutputMode {
        self.mode
    }

    /// Start timing an operation.
    pub fn start_timer(&mut self) {
        self.start_time = Some(Instant::now());
    }

    /// Get elapsed time since timer started.
    pub fn elapsed_secs(&self) -> f64 {
        self.start_time
            .map(|t| t.elapsed().as_secs_f64())
            .unwrap_or(0.0)
    }

    /// Print a progress message (suppressed in quiet/json mode).
    pub fn progress(&self, message: &str) {
        if self.mode == OutputMode::Normal {
            println!("{message}");
        }
    }

    /// Print a success message with optional timing.
    pub fn success(&self, message: &str) {
        match self.mode {
            OutputMode::Normal => {
                let elapsed = self.elapsed_secs();
                if elapsed > 0.0 {
                    println!("{message} ({:.1}s)", elapsed);
                } else {
                    println!("{message}");
                }
            }
            OutputMode::Quiet => println!("{message}"),
            OutputMode::Json => self.event("success", message, false),
        }
    }

    /// Print an error message.
    pub fn error(&self, message: &str) {
        match self.mode {
            OutputMode::Normal | OutputMode::Quiet => eprintln!("Error: {message}"),
            OutputMode::Json => self.event("error", message, true),
        }
    }

    fn event(&self, event: &str, message: &str, to_stderr: bool) {
        let event = JsonEvent {
            event,
            message,
            duration_secs: self.start_time.map(|_| self.elapsed_secs()),
        };
        if let Ok(json) = serde_json::to_string(&event) {
            if to_stderr {
                eprintln!("{json}");
            } else {
                println!("{json}");
            }
        }
    }

    /// Print the outcome of a pipeline run.
    pub fn report(&self, report: &PipelineReport) {
        match self.mode {
            OutputMode::Json => match serde_json::to_string_pretty(report) {
                Ok(json) => println!("{json}"),
                Err(e) => eprintln!("Error: failed to serialize report: {e}"),
            },
            OutputMode::Quiet => {
                println!("{} {}", report.pipeline, report.outcome);
                for job in report.failed() {
                    println!("{} failed: {}", job.id, job.error.as_deref().unwrap_or("unknown"));
                }
            }
            OutputMode::Normal => {
                println!();
                for job in &report.jobs {
                    let timing = job
                        .duration()
                        .map(|d| format!(" ({:.1}s)", d.num_milliseconds() as f64 / 1000.0))
                        .unwrap_or_default();
                    println!("  {:<10} {:<8} {}{}", job.id.as_str(), job.kind.to_string(), job.state, timing);
                    match job.state {
                        JobState::Succeeded => {
                            if let Some(summary) = &job.summary {
                                println!("             {summary}");
                            }
                        }
                        JobState::Failed => {
                            if let Some(error) = &job.error {
                                println!("             {error}");
                            }
                            for line in &job.diagnostic {
                                println!("             | {line}");
                            }
                        }
                        JobState::Skipped => {
                            if let Some(reason) = &job.skip_reason {
                                println!("             {reason}");
                            }
                        }
                        JobState::Pending | JobState::Running => {}
                    }
                }
                for warning in &report.warnings {
                    println!("  warning: {}", warning.message);
                }
                println!();
                println!(
                    "Pipeline {} {} on {} ({:.1}s)",
                    report.pipeline,
                    report.outcome,
                    report.runner,
                    (report.finished_at - report.started_at).num_milliseconds() as f64 / 1000.0
                );
            }
        }
    }
}

#[derive(Serialize)]
struct JsonEvent<'a> {
    event: &'a str,
    message: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    duration_secs: Option<f64>,
}
