//! Configuration for the result cache.

use std::num::NonZeroUsize;
use std::time::Duration;

/// Capacity and default time-to-live for a [`crate::ResultCache`].
#[derive(Debug, Clone, Copy)]
pub struct CacheConfig {
    max_entries: NonZeroUsize,
    default_ttl: Duration,
}

impl CacheConfig {
    /// Creates a configuration with the provided entry capacity.
    #[must_use]
    pub fn new(max_entries: NonZeroUsize) -> Self {
        Self {
            max_entries,
            default_ttl: Self::default().default_ttl,
        }
    }

    /// Sets the time-to-live applied when a store omits one.
    #[must_use]
    pub const fn with_default_ttl(mut self, default_ttl: Duration) -> Self {
        self.default_ttl = default_ttl;
        self
    }

    /// Returns the maximum number of entries retained.
    #[must_use]
    pub const fn max_entries(self) -> NonZeroUsize {
        self.max_entries
    }

    /// Returns the default time-to-live.
    #[must_use]
    pub const fn default_ttl(self) -> Duration {
        self.default_ttl
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_entries: NonZeroUsize::new(1024).expect("non-zero"),
            default_ttl: Duration::from_secs(300),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = CacheConfig::default();
        assert_eq!(config.max_entries().get(), 1024);
        assert_eq!(config.default_ttl(), Duration::from_secs(300));
    }

    #[test]
    fn overrides() {
        let config = CacheConfig::new(NonZeroUsize::new(2).unwrap())
            .with_default_ttl(Duration::from_secs(5));
        assert_eq!(config.max_entries().get(), 2);
        assert_eq!(config.default_ttl(), Duration::from_secs(5));
    }
}
