// ABOUTME: Command module aggregator for the hoist CLI.
// ABOUTME: Re-exports run, validate, stop, and init command handlers.

mod init;
mod run;
mod runtime_connection;
mod stop;
mod validate;

pub use init::init;
pub use run::{RunOptions, run};
pub use stop::stop;
pub use validate::validate;
