// ABOUTME: Entry point for the hoist CLI application.
// ABOUTME: Parses arguments and dispatches to appropriate command handlers.

mod cli;
mod commands;

use clap::Parser;
use cli::{Cli, Commands};
use hoist::cancel::CancelToken;
use hoist::config::Config;
use hoist::error::Result;
use hoist::output::{Output, OutputMode};
use std::env;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("warn")
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    match run(cli).await {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    }
}

async fn run(cli: Cli) -> Result<i32> {
    let cwd = env::current_dir()?;

    match cli.command {
        Commands::Init {
            service,
            image,
            force,
        } => {
            let output = Output::new(OutputMode::Normal);
            commands::init(&cwd, service.as_deref(), image.as_deref(), force, &output)?;
            Ok(0)
        }
        Commands::Validate => {
            let (config, _) = discover(&cwd)?;
            commands::validate(&config, &Output::new(OutputMode::Normal))?;
            Ok(0)
        }
        Commands::Run {
            branch,
            tag,
            dry_run,
            quiet,
            json,
        } => {
            let mode = if json {
                OutputMode::Json
            } else if quiet {
                OutputMode::Quiet
            } else {
                OutputMode::Normal
            };
            let (config, base) = discover(&cwd)?;

            let cancel = CancelToken::new();
            let on_interrupt = cancel.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    tracing::warn!("interrupted; cancelling pipeline");
                    on_interrupt.cancel();
                }
            });

            let options = commands::RunOptions {
                branch,
                tag,
                dry_run,
            };
            commands::run(config, &base, options, cancel, Output::new(mode)).await
        }
        Commands::Stop { name } => {
            let (config, _) = discover(&cwd)?;
            commands::stop(config, &name, Output::new(OutputMode::Normal)).await?;
            Ok(0)
        }
    }
}

/// Load the definition from `cwd`. The second value is the directory build
/// contexts resolve against.
fn discover(cwd: &Path) -> Result<(Config, PathBuf)> {
    let path = Config::locate(cwd)?;
    let config = Config::load(&path)?;
    let base = match path.parent() {
        Some(dir) if path.ends_with(hoist::config::CONFIG_FILENAME_DIR) => {
            dir.parent().unwrap_or(cwd).to_path_buf()
        }
        Some(dir) => dir.to_path_buf(),
        None => cwd.to_path_buf(),
    };
    Ok((config, base))
}
