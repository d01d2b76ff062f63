//! Stable fingerprints used as cache keys.

use std::fmt::{self, Display, Formatter, Write as _};

use serde_json::{Map, Value};
use sha2::{Digest, Sha256};
use tool_primitives::ToolId;

/// Cache key derived from a tool identifier and its parameters.
///
/// The key is `tool_id:sha256(params)` where the hash covers the canonical
/// JSON serialization of the parameter map. `serde_json` maps keep keys
/// sorted, so two parameter sets that differ only in insertion order
/// fingerprint identically.
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub struct CacheKey(String);

impl CacheKey {
    /// Computes the fingerprint for a tool invocation.
    #[must_use]
    pub fn new(tool_id: &ToolId, params: &Map<String, Value>) -> Self {
        let canonical =
            serde_json::to_vec(params).unwrap_or_default();
        let digest = Sha256::digest(&canonical);

        let mut key = String::with_capacity(tool_id.as_str().len() + 1 + digest.len() * 2);
        key.push_str(tool_id.as_str());
        key.push(':');
        for byte in digest {
            let _ = write!(key, "{byte:02x}");
        }
        Self(key)
    }

    /// Returns the prefix shared by every key belonging to a tool, suitable
    /// for [`crate::ResultCache::invalidate_prefix`].
    #[must_use]
    pub fn prefix_for(tool_id: &ToolId) -> String {
        format!("{tool_id}:")
    }

    /// Returns the key as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for CacheKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
