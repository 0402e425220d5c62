// ABOUTME: Sealed trait pattern for runtime traits.
// ABOUTME: Only runtimes defined in this crate may implement the capability traits.

/// Implemented by the engine-backed and in-memory runtimes.
pub trait Sealed {}
