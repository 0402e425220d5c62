// ABOUTME: Library root for hoist - exposes public types for testing.
// ABOUTME: The main binary is in main.rs.

pub mod build;
pub mod cancel;
pub mod config;
pub mod diagnostics;
pub mod error;
pub mod output;
pub mod pipeline;
pub mod probe;
pub mod registry;
pub mod retry;
pub mod runtime;
pub mod ssh;
pub mod target;
pub mod types;
