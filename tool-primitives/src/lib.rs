//! Core shared types for the toolgate execution engine.

#![warn(missing_docs, clippy::pedantic)]

mod context;
mod descriptor;
mod error;
mod ids;
mod limits;
mod outcome;
mod permissions;

/// Execution context threaded through every invocation of a run.
pub use context::{CacheControl, CachePriority, ExecutionContext, ExecutionContextBuilder, VariableStore};
/// Tool descriptors, parameter specifications, and supporting builders.
pub use descriptor::{ParameterSpec, ParameterType, ToolDescriptor, ToolDescriptorBuilder};
/// Error type and result alias shared across the engine crates.
pub use error::{Error, Result};
/// Identifier types for tools and runs.
pub use ids::{RunId, ToolId};
/// Per-invocation resource bounds.
pub use limits::{DEFAULT_MAX_CONCURRENT_OPERATIONS, DEFAULT_MAX_EXECUTION_TIME, ResourceLimits};
/// Invocation outcomes and their failure taxonomy.
pub use outcome::{FailureKind, ToolOutcome};
/// Permission grants, classes, and allow-list helpers.
pub use permissions::{EnvAccess, PermissionClass, Permissions};
