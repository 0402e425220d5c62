// ABOUTME: Command-line interface definition using clap derive macros.
// ABOUTME: Defines all subcommands and their arguments.

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "hoist")]
#[command(about = "Build, publish, deploy and verify a container as one pipeline")]
#[command(version)]
pub struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize a new hoist.yml configuration file
    Init {
        /// Service name
        #[arg(long)]
        service: Option<String>,

        /// Image repository to publish to
        #[arg(long)]
        image: Option<String>,

        /// Overwrite an existing hoist.yml
        #[arg(long)]
        force: bool,
    },

    /// Check the pipeline definition and print its jobs in order
    Validate,

    /// Run the pipeline
    Run {
        /// Branch that triggered this run (checked against trigger.branches)
        #[arg(long)]
        branch: Option<String>,

        /// Image tag for this run (default: UTC timestamp)
        #[arg(long)]
        tag: Option<String>,

        /// Use the in-memory runtime; nothing is built, pushed or started
        #[arg(long)]
        dry_run: bool,

        /// Only print the outcome and failures
        #[arg(short, long, conflicts_with = "json")]
        quiet: bool,

        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Stop a deployed container on the configured target
    Stop {
        /// Container name
        name: String,
    },
}
