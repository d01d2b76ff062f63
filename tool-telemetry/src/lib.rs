//! Metrics sink trait and recorders for governed tool invocations.
//!
//! The execution governor reports every invocation to a [`MetricsSink`].
//! Sinks are fire-and-forget collaborators: they must never fail or block
//! the invocation they describe.

#![warn(missing_docs, clippy::pedantic)]

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use tool_primitives::ToolId;
use tracing::info;

/// Receiver for per-invocation execution metrics.
pub trait MetricsSink: Send + Sync {
    /// Records one completed invocation with its duration and outcome.
    fn record_invocation(&self, tool_id: &ToolId, duration: Duration, success: bool);

    /// Records resource usage attributed to a tool, in bytes.
    fn record_resource_usage(&self, tool_id: &ToolId, bytes: u64);
}

/// Sink that emits metrics to the tracing system.
#[derive(Debug, Default)]
pub struct TracingMetricsSink;

impl MetricsSink for TracingMetricsSink {
    fn record_invocation(&self, tool_id: &ToolId, duration: Duration, success: bool) {
        info!(
            tool = %tool_id,
            duration_ms = duration.as_millis() as u64,
            success,
            "tool invocation recorded"
        );
    }

    fn record_resource_usage(&self, tool_id: &ToolId, bytes: u64) {
        info!(tool = %tool_id, bytes, "tool resource usage recorded");
    }
}

/// Per-tool counters collected by [`InMemoryMetrics`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ToolMetrics {
    /// Invocations that completed successfully.
    pub successes: u64,
    /// Invocations that completed with a failure outcome.
    pub failures: u64,
    /// Accumulated wall-clock time across invocations.
    pub total_duration: Duration,
    /// Accumulated resource usage in bytes.
    pub total_bytes: u64,
}

/// Sink that aggregates counters in memory, for tests and demos.
#[derive(Debug, Default)]
pub struct InMemoryMetrics {
    invocations: AtomicU64,
    per_tool: Mutex<HashMap<String, ToolMetrics>>,
}

impl InMemoryMetrics {
    /// Creates an empty recorder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the total number of recorded invocations.
    #[must_use]
    pub fn invocations(&self) -> u64 {
        self.invocations.load(Ordering::Relaxed)
    }

    /// Returns the counters recorded for one tool, zeroed when the tool has
    /// not been seen.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex has been poisoned by a previous panic.
    #[must_use]
    pub fn tool(&self, tool_id: &ToolId) -> ToolMetrics {
        let guard = self.per_tool.lock().expect("metrics poisoned");
        guard.get(tool_id.as_str()).copied().unwrap_or_default()
    }

    /// Returns a snapshot of every tool's counters.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex has been poisoned by a previous panic.
    #[must_use]
    pub fn snapshot(&self) -> HashMap<String, ToolMetrics> {
        let guard = self.per_tool.lock().expect("metrics poisoned");
        guard.clone()
    }
}

impl MetricsSink for InMemoryMetrics {
    fn record_invocation(&self, tool_id: &ToolId, duration: Duration, success: bool) {
        self.invocations.fetch_add(1, Ordering::Relaxed);
        let mut guard = self.per_tool.lock().expect("metrics poisoned");
        let entry = guard.entry(tool_id.as_str().to_owned()).or_default();
        if success {
            entry.successes += 1;
        } else {
            entry.failures += 1;
        }
        entry.total_duration += duration;
    }

    fn record_resource_usage(&self, tool_id: &ToolId, bytes: u64) {
        let mut guard = self.per_tool.lock().expect("metrics poisoned");
        let entry = guard.entry(tool_id.as_str().to_owned()).or_default();
        entry.total_bytes += bytes;
    }
}
