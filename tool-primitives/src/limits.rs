//! Per-invocation resource bounds.

use std::num::NonZeroUsize;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Execution deadline applied when [`ResourceLimits::max_execution_time`] is
/// unset.
pub const DEFAULT_MAX_EXECUTION_TIME: Duration = Duration::from_secs(30);

/// Concurrency bound applied when
/// [`ResourceLimits::max_concurrent_operations`] is unset.
pub const DEFAULT_MAX_CONCURRENT_OPERATIONS: NonZeroUsize = NonZeroUsize::new(32).unwrap();

/// Optional bounds enforced cooperatively by the execution governor.
///
/// Every field defaults to "unbounded" except the execution deadline and the
/// concurrency limit, which fall back to the crate defaults through the
/// `effective_*` accessors. Memory is advisory only; the engine performs no
/// allocation accounting.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceLimits {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    max_execution_time: Option<Duration>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    max_memory_bytes: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    max_output_size_bytes: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    max_concurrent_operations: Option<NonZeroUsize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    network_timeout: Option<Duration>,
}

impl ResourceLimits {
    /// Creates unbounded limits.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the wall-clock deadline for a single invocation.
    #[must_use]
    pub const fn with_max_execution_time(mut self, max_execution_time: Duration) -> Self {
        self.max_execution_time = Some(max_execution_time);
        self
    }

    /// Sets the advisory memory ceiling in bytes.
    #[must_use]
    pub const fn with_max_memory_bytes(mut self, max_memory_bytes: u64) -> Self {
        self.max_memory_bytes = Some(max_memory_bytes);
        self
    }

    /// Sets the payload size above which results are truncated.
    #[must_use]
    pub const fn with_max_output_size_bytes(mut self, max_output_size_bytes: usize) -> Self {
        self.max_output_size_bytes = Some(max_output_size_bytes);
        self
    }

    /// Sets the number of chain steps that may run concurrently.
    #[must_use]
    pub const fn with_max_concurrent_operations(
        mut self,
        max_concurrent_operations: NonZeroUsize,
    ) -> Self {
        self.max_concurrent_operations = Some(max_concurrent_operations);
        self
    }

    /// Sets the timeout for individual network operations inside a tool.
    #[must_use]
    pub const fn with_network_timeout(mut self, network_timeout: Duration) -> Self {
        self.network_timeout = Some(network_timeout);
        self
    }

    /// Returns the configured execution deadline, if any.
    #[must_use]
    pub const fn max_execution_time(&self) -> Option<Duration> {
        self.max_execution_time
    }

    /// Returns the advisory memory ceiling, if any.
    #[must_use]
    pub const fn max_memory_bytes(&self) -> Option<u64> {
        self.max_memory_bytes
    }

    /// Returns the payload truncation threshold, if any.
    #[must_use]
    pub const fn max_output_size_bytes(&self) -> Option<usize> {
        self.max_output_size_bytes
    }

    /// Returns the configured concurrency bound, if any.
    #[must_use]
    pub const fn max_concurrent_operations(&self) -> Option<NonZeroUsize> {
        self.max_concurrent_operations
    }

    /// Returns the network operation timeout, if any.
    #[must_use]
    pub const fn network_timeout(&self) -> Option<Duration> {
        self.network_timeout
    }

    /// Returns the execution deadline, falling back to
    /// [`DEFAULT_MAX_EXECUTION_TIME`].
    #[must_use]
    pub fn effective_execution_time(&self) -> Duration {
        self.max_execution_time.unwrap_or(DEFAULT_MAX_EXECUTION_TIME)
    }

    /// Returns the concurrency bound, falling back to
    /// [`DEFAULT_MAX_CONCURRENT_OPERATIONS`].
    #[must_use]
    pub fn effective_concurrency(&self) -> NonZeroUsize {
        self.max_concurrent_operations
            .unwrap_or(DEFAULT_MAX_CONCURRENT_OPERATIONS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_unbounded() {
        let limits = ResourceLimits::new();
        assert_eq!(limits.max_execution_time(), None);
        assert_eq!(limits.max_output_size_bytes(), None);
        assert_eq!(limits.effective_execution_time(), DEFAULT_MAX_EXECUTION_TIME);
        assert_eq!(
            limits.effective_concurrency(),
            DEFAULT_MAX_CONCURRENT_OPERATIONS
        );
    }

    #[test]
    fn setters_override_defaults() {
        let limits = ResourceLimits::new()
            .with_max_execution_time(Duration::from_millis(50))
            .with_max_output_size_bytes(512)
            .with_max_concurrent_operations(NonZeroUsize::new(2).unwrap());

        assert_eq!(limits.effective_execution_time(), Duration::from_millis(50));
        assert_eq!(limits.max_output_size_bytes(), Some(512));
        assert_eq!(limits.effective_concurrency().get(), 2);
    }
}
