//! Governed tool execution facade.
//!
//! Depend on this crate via `cargo add toolgate`. It bundles the internal
//! engine crates behind feature flags so downstream users can enable only the
//! components they need: the registry alone for a tool catalogue, the
//! executor for governed single invocations, or the chain scheduler for
//! whole workflows.

#![warn(missing_docs, clippy::pedantic)]

/// Re-export shared primitives for convenience.
pub use tool_primitives as primitives;

/// Tool registration and lookup (enabled by `registry` feature).
#[cfg(feature = "registry")]
pub use tool_registry as registry;

/// Result caching (enabled by `cache` feature).
#[cfg(feature = "cache")]
pub use tool_cache as cache;

/// Metrics sinks (enabled by `telemetry` feature).
#[cfg(feature = "telemetry")]
pub use tool_telemetry as telemetry;

/// The execution governor (enabled by `executor` feature).
#[cfg(feature = "executor")]
pub use tool_executor as executor;

/// Chain definitions and the DAG scheduler (enabled by `chain` feature).
#[cfg(feature = "chain")]
pub use tool_chain as chain;
