//! Cache utilisation statistics.

use std::collections::HashMap;

/// Hit and miss counters for a single tool.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ToolCacheStats {
    /// Lookups served from the cache.
    pub hits: u64,
    /// Lookups that fell through to execution.
    pub misses: u64,
}

/// Snapshot describing cache utilisation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CacheStatistics {
    /// Entries currently stored.
    pub entries: usize,
    /// Total lookups served from the cache.
    pub hits: u64,
    /// Total lookups that missed.
    pub misses: u64,
    /// Entries evicted to stay within capacity, cumulative over the cache's
    /// lifetime.
    pub evictions: u64,
    /// Per-tool hit and miss counters keyed by tool identifier.
    pub per_tool: HashMap<String, ToolCacheStats>,
}

impl CacheStatistics {
    /// Fraction of lookups served from the cache, in `[0.0, 1.0]`. Zero when
    /// no lookups have happened yet.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn hit_ratio(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            return 0.0;
        }
        self.hits as f64 / total as f64
    }
}
