// ABOUTME: Run command implementation.
// ABOUTME: Checks the trigger, wires components, runs the pipeline and prints the report.

use super::runtime_connection::{live_components, simulated_components};
use chrono::Utc;
use hoist::cancel::CancelToken;
use hoist::config::Config;
use hoist::error::Result;
use hoist::output::Output;
use hoist::pipeline::assemble;
use std::path::Path;
use std::sync::Arc;

/// Options for a single pipeline run.
pub struct RunOptions {
    pub branch: Option<String>,
    pub tag: Option<String>,
    pub dry_run: bool,
}

/// Run the pipeline. Returns the process exit code for its outcome.
pub async fn run(
    config: Config,
    base: &Path,
    options: RunOptions,
    cancel: CancelToken,
    mut output: Output,
) -> Result<i32> {
    if !config.triggered_by(options.branch.as_deref()) {
        output.success(&format!(
            "Branch {} does not trigger {}; nothing to do",
            options.branch.as_deref().unwrap_or_default(),
            config.service
        ));
        return Ok(0);
    }

    output.start_timer();
    let tag = options
        .tag
        .unwrap_or_else(|| Utc::now().format("%Y%m%d%H%M%S").to_string());

    output.progress(&format!(
        "Running {} ({}:{}){}",
        config.service,
        config.image.repository(),
        tag,
        if options.dry_run { " [dry run]" } else { "" }
    ));

    let (credential, warning) = if options.dry_run {
        config.registry.credential_or_anonymous(&config.image)?
    } else {
        (config.registry.credential(&config.image)?, None)
    };

    let (components, connection) = if options.dry_run {
        simulated_components(&config, &cancel)
    } else {
        live_components(&config, &cancel, &output).await?
    };

    let orchestrator = assemble(
        &config,
        base,
        &tag,
        components,
        Arc::new(credential),
        cancel,
    )?;
    if let Some(warning) = warning {
        orchestrator.warn(warning);
    }

    output.progress(&format!("  → Running {} job(s)...", orchestrator.graph().len()));
    let mut report = orchestrator.run().await;

    if let Some(warning) = connection.close().await {
        report.warnings.push(warning);
    }

    output.report(&report);
    Ok(report.exit_code())
}
