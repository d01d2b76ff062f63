//! Build-time chain validation errors.

use thiserror::Error;

/// Errors detected while building a chain's dependency graph.
///
/// These are the only errors a chain run can raise; once the graph is
/// accepted, every step failure is data in the run result.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ChainError {
    /// The chain declares no steps.
    #[error("chain has no steps")]
    EmptyChain,

    /// A step identifier failed validation.
    #[error("invalid step id `{id}`: {reason}")]
    InvalidStepId {
        /// The offending identifier string.
        id: String,
        /// Human-readable reason for rejection.
        reason: String,
    },

    /// Two steps share the same identifier.
    #[error("duplicate step id `{step}`")]
    DuplicateStep {
        /// The duplicated step identifier.
        step: String,
    },

    /// A step depends on an identifier no step declares.
    #[error("step `{step}` depends on unknown step `{dependency}`")]
    UnknownDependency {
        /// The step declaring the dependency.
        step: String,
        /// The missing dependency identifier.
        dependency: String,
    },

    /// The dependency relation contains a cycle.
    #[error("cyclic dependency involving steps: {}", steps.join(", "))]
    CyclicDependency {
        /// Steps participating in (or downstream of) the cycle.
        steps: Vec<String>,
    },
}
