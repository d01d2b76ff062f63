//! Capacity-bounded result store with TTL expiry and LRU eviction.

use std::collections::HashMap;
use std::time::Duration;

use tokio::sync::RwLock;
use tokio::time::Instant;
use tracing::debug;

use tool_primitives::{CachePriority, ToolOutcome};

use crate::config::CacheConfig;
use crate::key::CacheKey;
use crate::stats::{CacheStatistics, ToolCacheStats};

#[derive(Debug, Clone)]
struct CacheEntry {
    outcome: ToolOutcome,
    expires_at: Instant,
    hits: u64,
    priority: CachePriority,
    last_used: u64,
}

#[derive(Debug, Default)]
struct CacheInner {
    entries: HashMap<String, CacheEntry>,
    tick: u64,
    hits: u64,
    misses: u64,
    evictions: u64,
    per_tool: HashMap<String, ToolCacheStats>,
}

impl CacheInner {
    fn next_tick(&mut self) -> u64 {
        self.tick += 1;
        self.tick
    }

    fn tool_stats(&mut self, key: &str) -> &mut ToolCacheStats {
        let tool = key.split(':').next().unwrap_or(key).to_owned();
        self.per_tool.entry(tool).or_default()
    }

    fn record_hit(&mut self, key: &str) {
        self.hits += 1;
        self.tool_stats(key).hits += 1;
    }

    fn record_miss(&mut self, key: &str) {
        self.misses += 1;
        self.tool_stats(key).misses += 1;
    }

    fn evict_lru(&mut self) {
        let victim = self
            .entries
            .iter()
            .min_by_key(|(_, entry)| entry.last_used)
            .map(|(key, _)| key.clone());

        if let Some(key) = victim {
            self.entries.remove(&key);
            self.evictions += 1;
            debug!(key = %key, "cache entry evicted");
        }
    }
}

/// Shared store of prior tool outcomes keyed by [`CacheKey`].
///
/// Expiry is lazy: an expired entry is purged by the `get` that observes it,
/// no background sweep runs. Eviction follows global least-recently-used
/// order across all entries; the stored [`CachePriority`] is advisory only.
#[derive(Debug)]
pub struct ResultCache {
    config: CacheConfig,
    inner: RwLock<CacheInner>,
}

impl ResultCache {
    /// Creates a cache using the supplied configuration.
    #[must_use]
    pub fn new(config: CacheConfig) -> Self {
        Self {
            config,
            inner: RwLock::new(CacheInner::default()),
        }
    }

    /// Returns the configuration the cache was built with.
    #[must_use]
    pub const fn config(&self) -> CacheConfig {
        self.config
    }

    /// Looks up a stored outcome, refreshing its recency on a hit.
    ///
    /// An entry past its expiry behaves as a miss and is removed.
    pub async fn get(&self, key: &CacheKey) -> Option<ToolOutcome> {
        let mut guard = self.inner.write().await;
        let now = Instant::now();
        let tick = guard.next_tick();

        match guard.entries.get_mut(key.as_str()) {
            Some(entry) if entry.expires_at > now => {
                entry.hits += 1;
                entry.last_used = tick;
                let outcome = entry.outcome.clone();
                guard.record_hit(key.as_str());
                Some(outcome)
            }
            Some(_) => {
                guard.entries.remove(key.as_str());
                guard.record_miss(key.as_str());
                debug!(key = %key, "cache entry expired");
                None
            }
            None => {
                guard.record_miss(key.as_str());
                None
            }
        }
    }

    /// Stores an outcome, evicting the least-recently-used entry if the
    /// cache is at capacity.
    ///
    /// A `None` time-to-live falls back to the configured default.
    pub async fn insert(
        &self,
        key: &CacheKey,
        outcome: ToolOutcome,
        ttl: Option<Duration>,
        priority: CachePriority,
    ) {
        let ttl = ttl.unwrap_or_else(|| self.config.default_ttl());
        let mut guard = self.inner.write().await;
        let tick = guard.next_tick();

        if !guard.entries.contains_key(key.as_str()) {
            while guard.entries.len() >= self.config.max_entries().get() {
                guard.evict_lru();
            }
        }

        guard.entries.insert(
            key.as_str().to_owned(),
            CacheEntry {
                outcome,
                expires_at: Instant::now() + ttl,
                hits: 0,
                priority,
                last_used: tick,
            },
        );
    }

    /// Removes a single entry, returning `true` when one was present.
    pub async fn remove(&self, key: &CacheKey) -> bool {
        let mut guard = self.inner.write().await;
        guard.entries.remove(key.as_str()).is_some()
    }

    /// Removes every entry whose key starts with the supplied prefix,
    /// returning the number removed. Use [`CacheKey::prefix_for`] to
    /// invalidate all results for one tool.
    pub async fn invalidate_prefix(&self, prefix: &str) -> usize {
        let mut guard = self.inner.write().await;
        let before = guard.entries.len();
        guard.entries.retain(|key, _| !key.starts_with(prefix));
        let removed = before - guard.entries.len();
        if removed > 0 {
            debug!(prefix, removed, "cache entries invalidated");
        }
        removed
    }

    /// Empties the cache and resets hit and miss counters.
    ///
    /// The cumulative eviction counter survives a clear.
    pub async fn clear(&self) {
        let mut guard = self.inner.write().await;
        guard.entries.clear();
        guard.hits = 0;
        guard.misses = 0;
        guard.per_tool.clear();
    }

    /// Returns a snapshot of the cache statistics.
    pub async fn statistics(&self) -> CacheStatistics {
        let guard = self.inner.read().await;
        CacheStatistics {
            entries: guard.entries.len(),
            hits: guard.hits,
            misses: guard.misses,
            evictions: guard.evictions,
            per_tool: guard.per_tool.clone(),
        }
    }

    /// Returns the stored priority of an entry, mainly for diagnostics.
    pub async fn priority_of(&self, key: &CacheKey) -> Option<CachePriority> {
        let guard = self.inner.read().await;
        guard.entries.get(key.as_str()).map(|entry| entry.priority)
    }
}

impl Default for ResultCache {
    fn default() -> Self {
        Self::new(CacheConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::num::NonZeroUsize;

    use serde_json::{Map, json};
    use tool_primitives::ToolId;

    fn key(tool: &str, param: &str) -> CacheKey {
        let mut params = Map::new();
        params.insert("value".into(), json!(param));
        CacheKey::new(&ToolId::new(tool).unwrap(), &params)
    }

    fn outcome(text: &str) -> ToolOutcome {
        ToolOutcome::success(json!(text))
    }

    #[tokio::test]
    async fn round_trip_hit() {
        let cache = ResultCache::default();
        let key = key("echo", "a");

        cache
            .insert(&key, outcome("a"), None, CachePriority::Normal)
            .await;

        let hit = cache.get(&key).await.expect("hit");
        assert_eq!(hit.payload(), &json!("a"));

        let stats = cache.statistics().await;
        assert_eq!(stats.entries, 1);
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 0);
        assert_eq!(stats.per_tool["echo"].hits, 1);
    }

    #[tokio::test]
    async fn expired_entry_is_a_miss_and_purged() {
        let cache = ResultCache::default();
        let key = key("echo", "a");

        cache
            .insert(
                &key,
                outcome("a"),
                Some(Duration::from_millis(40)),
                CachePriority::Normal,
            )
            .await;

        assert!(cache.get(&key).await.is_some());

        tokio::time::sleep(Duration::from_millis(80)).await;
        assert!(cache.get(&key).await.is_none());

        let stats = cache.statistics().await;
        assert_eq!(stats.entries, 0);
        assert_eq!(stats.misses, 1);
    }

    #[tokio::test]
    async fn lru_entry_is_evicted_at_capacity() {
        let config = CacheConfig::new(NonZeroUsize::new(2).unwrap());
        let cache = ResultCache::new(config);

        let first = key("echo", "a");
        let second = key("echo", "b");
        let third = key("echo", "c");

        cache
            .insert(&first, outcome("a"), None, CachePriority::Normal)
            .await;
        cache
            .insert(&second, outcome("b"), None, CachePriority::Normal)
            .await;

        // Touch `first` so `second` becomes the LRU victim.
        assert!(cache.get(&first).await.is_some());

        cache
            .insert(&third, outcome("c"), None, CachePriority::High)
            .await;

        assert!(cache.get(&first).await.is_some());
        assert!(cache.get(&second).await.is_none());
        assert!(cache.get(&third).await.is_some());

        let stats = cache.statistics().await;
        assert_eq!(stats.evictions, 1);
        assert_eq!(cache.priority_of(&third).await, Some(CachePriority::High));
    }

    #[tokio::test]
    async fn prefix_invalidation_targets_one_tool() {
        let cache = ResultCache::default();

        cache
            .insert(&key("echo", "a"), outcome("a"), None, CachePriority::Normal)
            .await;
        cache
            .insert(&key("echo", "b"), outcome("b"), None, CachePriority::Normal)
            .await;
        cache
            .insert(
                &key("text.upper", "a"),
                outcome("A"),
                None,
                CachePriority::Normal,
            )
            .await;

        let removed = cache
            .invalidate_prefix(&CacheKey::prefix_for(&ToolId::new("echo").unwrap()))
            .await;
        assert_eq!(removed, 2);

        let stats = cache.statistics().await;
        assert_eq!(stats.entries, 1);
    }

    #[tokio::test]
    async fn clear_preserves_eviction_count() {
        let config = CacheConfig::new(NonZeroUsize::new(1).unwrap());
        let cache = ResultCache::new(config);

        cache
            .insert(&key("echo", "a"), outcome("a"), None, CachePriority::Normal)
            .await;
        cache
            .insert(&key("echo", "b"), outcome("b"), None, CachePriority::Normal)
            .await;

        assert!(cache.get(&key("echo", "b")).await.is_some());

        cache.clear().await;

        let stats = cache.statistics().await;
        assert_eq!(stats.entries, 0);
        assert_eq!(stats.hits, 0);
        assert_eq!(stats.misses, 0);
        assert_eq!(stats.evictions, 1);
        assert!(stats.per_tool.is_empty());
    }

    #[tokio::test]
    async fn remove_targets_a_single_key() {
        let cache = ResultCache::default();
        let key = key("echo", "a");

        cache
            .insert(&key, outcome("a"), None, CachePriority::Normal)
            .await;
        assert!(cache.remove(&key).await);
        assert!(!cache.remove(&key).await);
    }
}
