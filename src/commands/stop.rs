// ABOUTME: Stop command implementation.
// ABOUTME: Stops and removes a hoist-managed container on the configured target.

use super::runtime_connection::connect_target;
use hoist::config::Config;
use hoist::error::{Error, Result};
use hoist::output::Output;

pub async fn stop(config: Config, name: &str, output: Output) -> Result<()> {
    let connection = connect_target(&config, &output).await?;
    let host = connection.target.host().to_string();

    output.progress(&format!("  → Stopping {name}..."));
    let stopped = connection.target.stop_named(name).await;

    if let Some(warning) = connection.close().await {
        output.progress(&format!("  warning: {}", warning.message));
    }

    if !stopped? {
        return Err(Error::NoSuchContainer {
            name: name.to_string(),
            host,
        });
    }
    output.success(&format!("Stopped {name} on {host}"));
    Ok(())
}
