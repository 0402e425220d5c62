// ABOUTME: Init command implementation.
// ABOUTME: Writes a starter hoist.yml into the current directory.

use hoist::config::init_config;
use hoist::error::Result;
use hoist::output::Output;
use std::path::Path;

pub fn init(
    dir: &Path,
    service: Option<&str>,
    image: Option<&str>,
    force: bool,
    output: &Output,
) -> Result<()> {
    let path = init_config(dir, service, image, force)?;
    output.success(&format!("Created {}", path.display()));
    Ok(())
}
