//! Capability trait and the registry that owns registered tools.

#![warn(missing_docs, clippy::pedantic)]

mod capability;
mod error;
mod registry;

/// Capability trait implemented by tools, plus the paired handle type.
pub use capability::{Capability, CapabilityResult, ToolHandle};
/// Errors produced by registration, lookup, and tool execution.
pub use error::ToolError;
/// Registry storing tool handles keyed by identifier.
pub use registry::ToolRegistry;
