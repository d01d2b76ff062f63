//! Execution context shared by every invocation of a run.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::{RwLock, watch};

use crate::ids::RunId;
use crate::limits::ResourceLimits;
use crate::permissions::Permissions;

/// Relative importance of a cached result.
///
/// The priority is stored with each cache entry and surfaced through cache
/// statistics; eviction order itself follows global least-recently-used
/// recency regardless of priority.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CachePriority {
    /// Entry is cheap to recompute.
    Low,
    /// Entry has no special weighting.
    #[default]
    Normal,
    /// Entry is expensive to recompute.
    High,
}

/// Caching directive carried by the execution context.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheControl {
    enabled: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    ttl: Option<Duration>,
    #[serde(default)]
    priority: CachePriority,
}

impl CacheControl {
    /// Disables caching for the run. This is the default.
    #[must_use]
    pub fn disabled() -> Self {
        Self::default()
    }

    /// Enables caching with the cache's default time-to-live.
    #[must_use]
    pub fn enabled() -> Self {
        Self {
            enabled: true,
            ttl: None,
            priority: CachePriority::default(),
        }
    }

    /// Overrides the time-to-live applied to stored results.
    #[must_use]
    pub const fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = Some(ttl);
        self
    }

    /// Sets the priority recorded on stored results.
    #[must_use]
    pub const fn with_priority(mut self, priority: CachePriority) -> Self {
        self.priority = priority;
        self
    }

    /// Returns `true` when cache lookups and stores are enabled.
    #[must_use]
    pub const fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Returns the time-to-live override, if any.
    #[must_use]
    pub const fn ttl(&self) -> Option<Duration> {
        self.ttl
    }

    /// Returns the priority recorded on stored results.
    #[must_use]
    pub const fn priority(&self) -> CachePriority {
        self.priority
    }
}

/// Shared variable map acting as a chain's inter-step data bus.
///
/// The chain scheduler is the single writer: it records each step's result
/// under the step's own id once the step reaches a terminal state. Steps and
/// bindings only read, so a value observed by a dependent is always final.
#[derive(Clone, Debug, Default)]
pub struct VariableStore {
    inner: Arc<RwLock<HashMap<String, Value>>>,
}

impl VariableStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a clone of the value stored under `key`.
    pub async fn get(&self, key: &str) -> Option<Value> {
        let guard = self.inner.read().await;
        guard.get(key).cloned()
    }

    /// Stores `value` under `key`, replacing any previous value.
    pub async fn insert(&self, key: impl Into<String>, value: Value) {
        let mut guard = self.inner.write().await;
        guard.insert(key.into(), value);
    }

    /// Returns `true` when a value is stored under `key`.
    pub async fn contains(&self, key: &str) -> bool {
        let guard = self.inner.read().await;
        guard.contains_key(key)
    }

    /// Returns a point-in-time copy of the whole map.
    pub async fn snapshot(&self) -> HashMap<String, Value> {
        let guard = self.inner.read().await;
        guard.clone()
    }

    /// Returns the number of stored entries.
    pub async fn len(&self) -> usize {
        let guard = self.inner.read().await;
        guard.len()
    }

    /// Returns `true` when no entries are stored.
    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

/// Per-run state threaded through every invocation: working directory,
/// permissions, limits, cancellation, caching directive, and the shared
/// variable map.
///
/// One context is created per top-level call or chain run. Cloning is cheap
/// and every clone observes the same cancellation signal and variable map.
#[derive(Clone, Debug)]
pub struct ExecutionContext {
    working_dir: PathBuf,
    permissions: Arc<Permissions>,
    limits: ResourceLimits,
    cache: CacheControl,
    variables: VariableStore,
    run_id: RunId,
    session: Option<String>,
    cancel_tx: Arc<watch::Sender<bool>>,
    cancel_rx: watch::Receiver<bool>,
}

impl ExecutionContext {
    /// Starts building a context.
    #[must_use]
    pub fn builder() -> ExecutionContextBuilder {
        ExecutionContextBuilder {
            working_dir: None,
            permissions: Permissions::none(),
            limits: ResourceLimits::default(),
            cache: CacheControl::disabled(),
            session: None,
        }
    }

    /// Base directory tools should resolve relative paths against.
    #[must_use]
    pub fn working_dir(&self) -> &Path {
        &self.working_dir
    }

    /// Permission grants for this run.
    #[must_use]
    pub fn permissions(&self) -> &Permissions {
        &self.permissions
    }

    /// Resource bounds for this run.
    #[must_use]
    pub const fn limits(&self) -> ResourceLimits {
        self.limits
    }

    /// Caching directive for this run.
    #[must_use]
    pub const fn cache_control(&self) -> CacheControl {
        self.cache
    }

    /// Shared variable map for chain steps.
    #[must_use]
    pub fn variables(&self) -> &VariableStore {
        &self.variables
    }

    /// Correlation identifier for this run.
    #[must_use]
    pub const fn run_id(&self) -> RunId {
        self.run_id
    }

    /// Optional caller-supplied session identifier.
    #[must_use]
    pub fn session(&self) -> Option<&str> {
        self.session.as_deref()
    }

    /// Requests cancellation of every invocation observing this context.
    pub fn cancel(&self) {
        let _ = self.cancel_tx.send(true);
    }

    /// Returns `true` once cancellation has been requested.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        *self.cancel_rx.borrow()
    }

    /// Completes once cancellation is requested. Never completes for a run
    /// that is not cancelled.
    pub async fn cancelled(&self) {
        let mut rx = self.cancel_rx.clone();
        if *rx.borrow() {
            return;
        }
        while rx.changed().await.is_ok() {
            if *rx.borrow() {
                return;
            }
        }
        // Sender gone means no cancellation can ever arrive.
        std::future::pending::<()>().await;
    }
}

impl Default for ExecutionContext {
    fn default() -> Self {
        Self::builder().build()
    }
}

/// Builder for [`ExecutionContext`].
pub struct ExecutionContextBuilder {
    working_dir: Option<PathBuf>,
    permissions: Permissions,
    limits: ResourceLimits,
    cache: CacheControl,
    session: Option<String>,
}

impl ExecutionContextBuilder {
    /// Sets the working directory. Defaults to the process temp directory.
    #[must_use]
    pub fn working_dir(mut self, working_dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(working_dir.into());
        self
    }

    /// Sets the permission grants. Defaults to [`Permissions::none`].
    #[must_use]
    pub fn permissions(mut self, permissions: Permissions) -> Self {
        self.permissions = permissions;
        self
    }

    /// Sets the resource limits. Defaults to unbounded.
    #[must_use]
    pub const fn limits(mut self, limits: ResourceLimits) -> Self {
        self.limits = limits;
        self
    }

    /// Sets the caching directive. Defaults to disabled.
    #[must_use]
    pub const fn cache_control(mut self, cache: CacheControl) -> Self {
        self.cache = cache;
        self
    }

    /// Attaches a caller-supplied session identifier.
    #[must_use]
    pub fn session(mut self, session: impl Into<String>) -> Self {
        self.session = Some(session.into());
        self
    }

    /// Finalises the context, generating a fresh run id and cancellation
    /// signal.
    #[must_use]
    pub fn build(self) -> ExecutionContext {
        let (cancel_tx, cancel_rx) = watch::channel(false);
        ExecutionContext {
            working_dir: self.working_dir.unwrap_or_else(std::env::temp_dir),
            permissions: Arc::new(self.permissions),
            limits: self.limits,
            cache: self.cache,
            variables: VariableStore::new(),
            run_id: RunId::random(),
            session: self.session,
            cancel_tx: Arc::new(cancel_tx),
            cancel_rx,
        }
    }
}
