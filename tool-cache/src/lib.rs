//! Result cache for governed tool invocations.

#![warn(missing_docs, clippy::pedantic)]

mod config;
mod key;
mod stats;
mod store;

/// Cache capacity and default time-to-live configuration.
pub use config::CacheConfig;
/// Fingerprint-based cache keys.
pub use key::CacheKey;
/// Hit, miss, and eviction statistics.
pub use stats::{CacheStatistics, ToolCacheStats};
/// The capacity-bounded result store.
pub use store::ResultCache;
