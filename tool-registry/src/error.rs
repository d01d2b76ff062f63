//! Errors produced by tool registration and execution.

use thiserror::Error;
use tool_primitives::ToolId;

/// Errors surfaced by the registry and by tool implementations.
#[derive(Debug, Error)]
pub enum ToolError {
    /// Tool identifier collided with an existing registration.
    #[error("tool `{id}` is already registered")]
    DuplicateTool {
        /// Identifier of the offending tool.
        id: ToolId,
    },

    /// Requested tool does not exist.
    #[error("tool `{id}` is not registered")]
    UnknownTool {
        /// Identifier of the missing tool.
        id: ToolId,
    },

    /// The tool rejected its concrete argument against an allow-list.
    #[error("access denied: {reason}")]
    Denied {
        /// Human-readable reason for the denial.
        reason: String,
    },

    /// Tool execution failed.
    #[error("tool execution failed: {reason}")]
    Execution {
        /// Human-readable error returned by the tool implementation.
        reason: String,
    },
}

impl ToolError {
    /// Creates an execution error from the supplied reason.
    #[must_use]
    pub fn execution(reason: impl Into<String>) -> Self {
        Self::Execution {
            reason: reason.into(),
        }
    }

    /// Creates a denial error from the supplied reason. Tools use this when
    /// a path, domain, or command fails its allow-list check.
    #[must_use]
    pub fn denied(reason: impl Into<String>) -> Self {
        Self::Denied {
            reason: reason.into(),
        }
    }
}
