//! Declarative DAG workflows of governed tool invocations.
//!
//! A [`ChainDefinition`] names steps, their parameter bindings, dependencies,
//! and optional conditions. The [`ChainRunner`] validates the dependency
//! graph, then executes independent steps concurrently through the execution
//! governor, feeding each step's result into the run's shared variable map
//! for later bindings to consume.

#![warn(missing_docs, clippy::pedantic)]

mod binding;
mod definition;
mod error;
mod graph;
mod runner;
mod worker_pool;

/// Chain and step declarations, bindings, conditions, and error policies.
pub use definition::{
    ChainDefinition, ChainDefinitionBuilder, ChainStep, Condition, ErrorPolicy, StepBinding,
};
/// Build-time chain validation errors.
pub use error::ChainError;
/// The concurrent scheduler and its run results.
pub use runner::{ChainRunResult, ChainRunner, StepDisposition};
/// Semaphore-bounded task pool used by the scheduler.
pub use worker_pool::WorkerPool;
