//! Execution governor wrapping every tool invocation.
//!
//! The governor is the only path through which tools run: it validates
//! parameters against the descriptor, checks permission grants, consults the
//! result cache, enforces the execution deadline, and converts every fault
//! into a failure outcome. Callers always get a [`tool_primitives::ToolOutcome`]
//! back, never a raised error.

#![warn(missing_docs, clippy::pedantic)]

mod executor;
mod validate;

/// The governor that executes registered tools under policy.
pub use executor::ToolExecutor;
