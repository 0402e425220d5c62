// ABOUTME: Validate command implementation.
// ABOUTME: Loads the definition and prints the job graph in execution order.

use hoist::config::Config;
use hoist::error::Result;
use hoist::output::Output;

pub fn validate(config: &Config, output: &Output) -> Result<()> {
    let graph = config.graph()?;

    output.progress(&format!("{} ({})", config.service, config.image));
    for job in graph.jobs() {
        let needs: Vec<&str> = job.needs.iter().map(|id| id.as_str()).collect();
        if needs.is_empty() {
            output.progress(&format!("  {} [{}]", job.id, job.kind));
        } else {
            output.progress(&format!("  {} [{}] needs {}", job.id, job.kind, needs.join(", ")));
        }
    }
    output.success(&format!("{} job(s), definition is valid", graph.len()));
    Ok(())
}
