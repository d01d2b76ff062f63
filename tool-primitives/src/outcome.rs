//! Invocation outcomes and the failure taxonomy.

use std::fmt::{self, Display, Formatter};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

const META_CACHE_HIT: &str = "cache_hit";
const META_TRUNCATED: &str = "truncated";

/// Machine-readable classification of a failed invocation.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// A parameter was missing, mistyped, or violated a declared constraint.
    InvalidParameter,
    /// A required permission class was not granted, or an allow-list check
    /// rejected the concrete argument.
    AccessDenied,
    /// The invocation exceeded its execution deadline.
    Timeout,
    /// The run's context was cancelled by the caller.
    Cancelled,
    /// No tool is registered under the requested identifier.
    CapabilityNotFound,
    /// The tool raised a fault while executing.
    InternalError,
}

impl FailureKind {
    /// Stable label used in logs and serialized results.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::InvalidParameter => "invalid_parameter",
            Self::AccessDenied => "access_denied",
            Self::Timeout => "timeout",
            Self::Cancelled => "cancelled",
            Self::CapabilityNotFound => "capability_not_found",
            Self::InternalError => "internal_error",
        }
    }
}

impl Display for FailureKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Result of one governed tool invocation.
///
/// Outcomes are always returned as data: the governor converts every fault
/// into a failed outcome carrying a [`FailureKind`] and a human-readable
/// message, so callers never need to catch anything.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ToolOutcome {
    success: bool,
    payload: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    failure: Option<FailureKind>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    message: Option<String>,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    metadata: Map<String, Value>,
    #[serde(default)]
    duration: Duration,
}

impl ToolOutcome {
    /// Creates a successful outcome carrying the tool's payload.
    #[must_use]
    pub fn success(payload: Value) -> Self {
        Self {
            success: true,
            payload,
            failure: None,
            message: None,
            metadata: Map::new(),
            duration: Duration::ZERO,
        }
    }

    /// Creates a failed outcome with a kind and message.
    #[must_use]
    pub fn failure(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            success: false,
            payload: Value::Null,
            failure: Some(kind),
            message: Some(message.into()),
            metadata: Map::new(),
            duration: Duration::ZERO,
        }
    }

    /// Replaces the payload, keeping every other field.
    #[must_use]
    pub fn with_payload(mut self, payload: Value) -> Self {
        self.payload = payload;
        self
    }

    /// Records the wall-clock duration of the invocation.
    #[must_use]
    pub const fn with_duration(mut self, duration: Duration) -> Self {
        self.duration = duration;
        self
    }

    /// Attaches a metadata entry.
    #[must_use]
    pub fn with_metadata(mut self, key: impl Into<String>, value: Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }

    /// Flags the outcome as served from the result cache.
    #[must_use]
    pub fn with_cache_hit(self) -> Self {
        self.with_metadata(META_CACHE_HIT, Value::Bool(true))
    }

    /// Flags the payload as truncated by the output size limit.
    #[must_use]
    pub fn with_truncated(self) -> Self {
        self.with_metadata(META_TRUNCATED, Value::Bool(true))
    }

    /// Returns `true` when the invocation succeeded.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        self.success
    }

    /// Returns the payload. `Value::Null` for failed outcomes.
    #[must_use]
    pub const fn payload(&self) -> &Value {
        &self.payload
    }

    /// Returns the failure kind for failed outcomes.
    #[must_use]
    pub const fn failure_kind(&self) -> Option<FailureKind> {
        self.failure
    }

    /// Returns the human-readable failure message, if any.
    #[must_use]
    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    /// Returns the metadata map.
    #[must_use]
    pub const fn metadata(&self) -> &Map<String, Value> {
        &self.metadata
    }

    /// Looks up a single metadata entry.
    #[must_use]
    pub fn metadata_value(&self, key: &str) -> Option<&Value> {
        self.metadata.get(key)
    }

    /// Returns `true` when this outcome was served from the cache.
    #[must_use]
    pub fn is_cache_hit(&self) -> bool {
        matches!(self.metadata.get(META_CACHE_HIT), Some(Value::Bool(true)))
    }

    /// Returns `true` when the payload was truncated.
    #[must_use]
    pub fn is_truncated(&self) -> bool {
        matches!(self.metadata.get(META_TRUNCATED), Some(Value::Bool(true)))
    }

    /// Returns the recorded wall-clock duration.
    #[must_use]
    pub const fn duration(&self) -> Duration {
        self.duration
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn success_outcome_carries_payload() {
        let outcome = ToolOutcome::success(json!({"lines": 3}))
            .with_duration(Duration::from_millis(12));

        assert!(outcome.is_success());
        assert_eq!(outcome.payload(), &json!({"lines": 3}));
        assert_eq!(outcome.failure_kind(), None);
        assert_eq!(outcome.duration(), Duration::from_millis(12));
        assert!(!outcome.is_cache_hit());
    }

    #[test]
    fn failure_outcome_carries_kind_and_message() {
        let outcome = ToolOutcome::failure(FailureKind::AccessDenied, "filesystem-write missing");

        assert!(!outcome.is_success());
        assert_eq!(outcome.failure_kind(), Some(FailureKind::AccessDenied));
        assert_eq!(outcome.message(), Some("filesystem-write missing"));
        assert_eq!(outcome.payload(), &Value::Null);
    }

    #[test]
    fn metadata_flags_round_trip() {
        let outcome = ToolOutcome::success(json!("x")).with_cache_hit().with_truncated();
        assert!(outcome.is_cache_hit());
        assert!(outcome.is_truncated());
        assert_eq!(outcome.metadata_value("cache_hit"), Some(&json!(true)));
    }

    #[test]
    fn serializes_with_stable_failure_labels() {
        let outcome = ToolOutcome::failure(FailureKind::Timeout, "too slow");
        let encoded = serde_json::to_value(&outcome).expect("encode");
        assert_eq!(encoded["failure"], json!("timeout"));
        assert_eq!(FailureKind::CapabilityNotFound.to_string(), "capability_not_found");
    }
}
