//! The governed execution pipeline.

use std::sync::Arc;
use std::time::Duration;

use serde_json::{Map, Value};
use tokio::time::{Instant, timeout};
use tracing::{debug, info, warn};

use tool_cache::{CacheKey, ResultCache};
use tool_primitives::{ExecutionContext, FailureKind, ToolId, ToolOutcome};
use tool_registry::{ToolError, ToolHandle, ToolRegistry};
use tool_telemetry::MetricsSink;

use crate::validate::validate_parameters;

/// Governor that wraps every tool invocation with validation, permission
/// checks, caching, deadline enforcement, and metrics.
///
/// The governor holds no mutable state of its own; the registry, cache, and
/// metrics sink are shared collaborators, so one executor can serve many
/// concurrent invocations and chain runs.
#[derive(Clone)]
pub struct ToolExecutor {
    registry: Arc<ToolRegistry>,
    cache: Option<Arc<ResultCache>>,
    metrics: Option<Arc<dyn MetricsSink>>,
}

impl std::fmt::Debug for ToolExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolExecutor")
            .field("tools", &self.registry.len())
            .field("cache_configured", &self.cache.is_some())
            .field("metrics_configured", &self.metrics.is_some())
            .finish_non_exhaustive()
    }
}

impl ToolExecutor {
    /// Creates a governor over the supplied registry, without caching or
    /// metrics.
    #[must_use]
    pub fn new(registry: Arc<ToolRegistry>) -> Self {
        Self {
            registry,
            cache: None,
            metrics: None,
        }
    }

    /// Configures the result cache, returning the updated executor for
    /// chaining.
    #[must_use]
    pub fn with_cache(mut self, cache: Arc<ResultCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Configures the metrics sink, returning the updated executor for
    /// chaining.
    #[must_use]
    pub fn with_metrics(mut self, metrics: Arc<dyn MetricsSink>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Returns the registry this governor resolves tools through.
    #[must_use]
    pub fn registry(&self) -> &Arc<ToolRegistry> {
        &self.registry
    }

    /// Returns the configured result cache, if any.
    #[must_use]
    pub fn cache(&self) -> Option<&Arc<ResultCache>> {
        self.cache.as_ref()
    }

    /// Executes a registered tool under the governed pipeline.
    ///
    /// Every failure is reported as an unsuccessful [`ToolOutcome`] carrying
    /// a [`FailureKind`]; this method never panics on tool faults and never
    /// returns a raised error.
    pub async fn execute(
        &self,
        tool_id: &ToolId,
        params: Map<String, Value>,
        ctx: &ExecutionContext,
    ) -> ToolOutcome {
        let Some(handle) = self.registry.get(tool_id) else {
            warn!(tool = %tool_id, "tool not registered");
            let outcome =
                ToolOutcome::failure(FailureKind::CapabilityNotFound, format!("tool `{tool_id}` is not registered"));
            self.record(tool_id, &outcome);
            return outcome;
        };

        self.execute_handle(&handle, params, ctx).await
    }

    /// Executes an already-resolved handle under the governed pipeline.
    pub async fn execute_handle(
        &self,
        handle: &ToolHandle,
        params: Map<String, Value>,
        ctx: &ExecutionContext,
    ) -> ToolOutcome {
        let descriptor = handle.descriptor();
        let tool_id = descriptor.id().clone();
        let started = Instant::now();

        let params = match validate_parameters(descriptor, params) {
            Ok(params) => params,
            Err(reason) => {
                debug!(tool = %tool_id, reason, "parameter validation failed");
                let outcome = ToolOutcome::failure(FailureKind::InvalidParameter, reason)
                    .with_duration(started.elapsed());
                self.record(&tool_id, &outcome);
                return outcome;
            }
        };

        for class in descriptor.required_permissions() {
            if !ctx.permissions().grants(*class) {
                warn!(tool = %tool_id, permission = class.label(), "permission not granted");
                let outcome = ToolOutcome::failure(
                    FailureKind::AccessDenied,
                    format!("permission `{}` is not granted", class.label()),
                )
                .with_duration(started.elapsed());
                self.record(&tool_id, &outcome);
                return outcome;
            }
        }

        // The fingerprint covers the defaults-filled map, so explicit and
        // defaulted invocations of the same effective call share an entry.
        let cache_key = self.cache_key(descriptor.is_cacheable(), &tool_id, &params, ctx);
        if let (Some(cache), Some(key)) = (&self.cache, &cache_key)
            && let Some(cached) = cache.get(key).await
        {
            debug!(tool = %tool_id, run = %ctx.run_id(), "cache hit");
            return cached.with_cache_hit();
        }

        let outcome = self.invoke(handle, &tool_id, params, ctx, started).await;

        let outcome = self.post_process(&tool_id, outcome, ctx, cache_key.as_ref()).await;
        self.record(&tool_id, &outcome);
        outcome
    }

    fn cache_key(
        &self,
        cacheable: bool,
        tool_id: &ToolId,
        params: &Map<String, Value>,
        ctx: &ExecutionContext,
    ) -> Option<CacheKey> {
        if self.cache.is_some() && cacheable && ctx.cache_control().is_enabled() {
            Some(CacheKey::new(tool_id, params))
        } else {
            None
        }
    }

    async fn invoke(
        &self,
        handle: &ToolHandle,
        tool_id: &ToolId,
        params: Map<String, Value>,
        ctx: &ExecutionContext,
        started: Instant,
    ) -> ToolOutcome {
        if ctx.is_cancelled() {
            return ToolOutcome::failure(FailureKind::Cancelled, "run was cancelled")
                .with_duration(started.elapsed());
        }

        let deadline = ctx.limits().effective_execution_time();
        let result = tokio::select! {
            () = ctx.cancelled() => {
                warn!(tool = %tool_id, run = %ctx.run_id(), "invocation cancelled");
                Err(ToolOutcome::failure(FailureKind::Cancelled, "run was cancelled"))
            }
            invoked = timeout(deadline, handle.execute(params, ctx)) => match invoked {
                Ok(Ok(payload)) => Ok(payload),
                Ok(Err(fault)) => Err(map_fault(&fault)),
                Err(_) => {
                    warn!(tool = %tool_id, deadline_ms = deadline.as_millis() as u64, "invocation timed out");
                    Err(ToolOutcome::failure(
                        FailureKind::Timeout,
                        format!("execution exceeded {}ms", deadline.as_millis()),
                    ))
                }
            }
        };

        let duration = started.elapsed();
        match result {
            Ok(payload) => {
                info!(
                    tool = %tool_id,
                    run = %ctx.run_id(),
                    duration_ms = duration.as_millis() as u64,
                    "invocation completed"
                );
                ToolOutcome::success(payload).with_duration(duration)
            }
            Err(outcome) => outcome.with_duration(duration),
        }
    }

    async fn post_process(
        &self,
        tool_id: &ToolId,
        outcome: ToolOutcome,
        ctx: &ExecutionContext,
        cache_key: Option<&CacheKey>,
    ) -> ToolOutcome {
        if !outcome.is_success() {
            return outcome;
        }

        let size = payload_size_bytes(outcome.payload());
        if let Some(metrics) = &self.metrics {
            metrics.record_resource_usage(tool_id, size as u64);
        }

        let outcome = match ctx.limits().max_output_size_bytes() {
            Some(max) if size > max => {
                debug!(tool = %tool_id, size, max, "payload truncated");
                truncate_payload(outcome, max)
            }
            _ => outcome,
        };

        if let (Some(cache), Some(key)) = (&self.cache, cache_key) {
            let control = ctx.cache_control();
            cache
                .insert(key, outcome.clone(), control.ttl(), control.priority())
                .await;
        }

        outcome
    }

    fn record(&self, tool_id: &ToolId, outcome: &ToolOutcome) {
        if let Some(metrics) = &self.metrics {
            metrics.record_invocation(tool_id, outcome.duration(), outcome.is_success());
        }
    }
}

fn map_fault(fault: &ToolError) -> ToolOutcome {
    match fault {
        ToolError::Denied { reason } => {
            ToolOutcome::failure(FailureKind::AccessDenied, reason.clone())
        }
        other => ToolOutcome::failure(FailureKind::InternalError, other.to_string()),
    }
}

fn payload_size_bytes(payload: &Value) -> usize {
    match payload {
        Value::String(text) => text.len(),
        other => serde_json::to_string(other).map_or(0, |encoded| encoded.len()),
    }
}

fn truncate_payload(outcome: ToolOutcome, max: usize) -> ToolOutcome {
    let text = match outcome.payload() {
        Value::String(text) => text.clone(),
        other => serde_json::to_string(other).unwrap_or_default(),
    };

    let mut cut = String::with_capacity(max);
    for ch in text.chars() {
        if cut.len() + ch.len_utf8() > max {
            break;
        }
        cut.push(ch);
    }

    outcome.with_payload(Value::String(cut)).with_truncated()
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::atomic::{AtomicUsize, Ordering};

    use serde_json::json;
    use tool_primitives::{
        CacheControl, ParameterSpec, ParameterType, PermissionClass, Permissions, ResourceLimits,
        ToolDescriptor,
    };
    use tool_telemetry::InMemoryMetrics;

    fn echo_descriptor(cacheable: bool) -> ToolDescriptor {
        ToolDescriptor::builder(ToolId::new("echo").unwrap())
            .parameter(ParameterSpec::required("value", ParameterType::String).unwrap())
            .cacheable(cacheable)
            .build()
            .unwrap()
    }

    fn counting_echo(counter: Arc<AtomicUsize>) -> impl Fn(Map<String, Value>, ExecutionContext) -> std::pin::Pin<Box<dyn Future<Output = tool_registry::CapabilityResult<Value>> + Send>> {
        move |params, _ctx| {
            let counter = counter.clone();
            Box::pin(async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(params.get("value").cloned().unwrap_or(Value::Null))
            })
        }
    }

    fn executor_with(descriptor: ToolDescriptor, counter: Arc<AtomicUsize>) -> ToolExecutor {
        let registry = Arc::new(ToolRegistry::new());
        registry
            .register(descriptor, counting_echo(counter))
            .unwrap();
        ToolExecutor::new(registry)
    }

    fn params(value: &str) -> Map<String, Value> {
        let mut params = Map::new();
        params.insert("value".into(), json!(value));
        params
    }

    #[tokio::test]
    async fn invokes_capability_exactly_once() {
        let counter = Arc::new(AtomicUsize::new(0));
        let executor = executor_with(echo_descriptor(false), counter.clone());
        let ctx = ExecutionContext::default();

        let outcome = executor
            .execute(&ToolId::new("echo").unwrap(), params("hello"), &ctx)
            .await;

        assert!(outcome.is_success());
        assert_eq!(outcome.payload(), &json!("hello"));
        assert_eq!(counter.load(Ordering::SeqCst), 1);
        assert!(!outcome.is_cache_hit());
    }

    #[tokio::test]
    async fn invalid_parameter_short_circuits() {
        let counter = Arc::new(AtomicUsize::new(0));
        let executor = executor_with(echo_descriptor(false), counter.clone());
        let ctx = ExecutionContext::default();

        let outcome = executor
            .execute(&ToolId::new("echo").unwrap(), Map::new(), &ctx)
            .await;

        assert_eq!(outcome.failure_kind(), Some(FailureKind::InvalidParameter));
        assert_eq!(counter.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn missing_permission_short_circuits() {
        let counter = Arc::new(AtomicUsize::new(0));
        let descriptor = ToolDescriptor::builder(ToolId::new("writer").unwrap())
            .requires(PermissionClass::FileSystemWrite)
            .build()
            .unwrap();
        let registry = Arc::new(ToolRegistry::new());
        registry
            .register(descriptor, counting_echo(counter.clone()))
            .unwrap();
        let executor = ToolExecutor::new(registry);

        let ctx = ExecutionContext::builder()
            .permissions(Permissions::none().allow_file_read())
            .build();
        let outcome = executor
            .execute(&ToolId::new("writer").unwrap(), Map::new(), &ctx)
            .await;

        assert_eq!(outcome.failure_kind(), Some(FailureKind::AccessDenied));
        assert!(outcome.message().unwrap().contains("filesystem-write"));
        assert_eq!(counter.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn unknown_tool_reports_capability_not_found() {
        let executor = ToolExecutor::new(Arc::new(ToolRegistry::new()));
        let ctx = ExecutionContext::default();

        let outcome = executor
            .execute(&ToolId::new("missing").unwrap(), Map::new(), &ctx)
            .await;

        assert_eq!(outcome.failure_kind(), Some(FailureKind::CapabilityNotFound));
    }

    #[tokio::test]
    async fn cache_hit_skips_second_invocation() {
        let counter = Arc::new(AtomicUsize::new(0));
        let executor = executor_with(echo_descriptor(true), counter.clone())
            .with_cache(Arc::new(ResultCache::default()));

        let ctx = ExecutionContext::builder()
            .cache_control(CacheControl::enabled())
            .build();
        let id = ToolId::new("echo").unwrap();

        let first = executor.execute(&id, params("hello"), &ctx).await;
        assert!(first.is_success());
        assert!(!first.is_cache_hit());

        let second = executor.execute(&id, params("hello"), &ctx).await;
        assert!(second.is_success());
        assert!(second.is_cache_hit());
        assert_eq!(second.payload(), &json!("hello"));
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn caching_disabled_context_always_invokes() {
        let counter = Arc::new(AtomicUsize::new(0));
        let executor = executor_with(echo_descriptor(true), counter.clone())
            .with_cache(Arc::new(ResultCache::default()));

        let ctx = ExecutionContext::default();
        let id = ToolId::new("echo").unwrap();
        executor.execute(&id, params("hello"), &ctx).await;
        executor.execute(&id, params("hello"), &ctx).await;

        assert_eq!(counter.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn slow_tool_times_out() {
        let descriptor = ToolDescriptor::builder(ToolId::new("slow").unwrap())
            .build()
            .unwrap();
        let registry = Arc::new(ToolRegistry::new());
        registry
            .register(descriptor, |_params: Map<String, Value>, _ctx: ExecutionContext| async move {
                tokio::time::sleep(Duration::from_millis(200)).await;
                Ok(json!("late"))
            })
            .unwrap();
        let executor = ToolExecutor::new(registry);

        let ctx = ExecutionContext::builder()
            .limits(ResourceLimits::new().with_max_execution_time(Duration::from_millis(50)))
            .build();
        let outcome = executor
            .execute(&ToolId::new("slow").unwrap(), Map::new(), &ctx)
            .await;

        assert_eq!(outcome.failure_kind(), Some(FailureKind::Timeout));
    }

    #[tokio::test]
    async fn caller_cancellation_is_distinct_from_timeout() {
        let descriptor = ToolDescriptor::builder(ToolId::new("slow").unwrap())
            .build()
            .unwrap();
        let registry = Arc::new(ToolRegistry::new());
        registry
            .register(descriptor, |_params: Map<String, Value>, _ctx: ExecutionContext| async move {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Ok(json!("late"))
            })
            .unwrap();
        let executor = ToolExecutor::new(registry);

        let ctx = ExecutionContext::default();
        let canceller = ctx.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            canceller.cancel();
        });

        let outcome = executor
            .execute(&ToolId::new("slow").unwrap(), Map::new(), &ctx)
            .await;

        assert_eq!(outcome.failure_kind(), Some(FailureKind::Cancelled));
    }

    #[tokio::test]
    async fn fault_translates_to_internal_error() {
        let descriptor = ToolDescriptor::builder(ToolId::new("broken").unwrap())
            .build()
            .unwrap();
        let registry = Arc::new(ToolRegistry::new());
        registry
            .register(descriptor, |_params: Map<String, Value>, _ctx: ExecutionContext| async move {
                Err::<Value, _>(ToolError::execution("backend offline"))
            })
            .unwrap();
        let executor = ToolExecutor::new(registry);

        let outcome = executor
            .execute(
                &ToolId::new("broken").unwrap(),
                Map::new(),
                &ExecutionContext::default(),
            )
            .await;

        assert_eq!(outcome.failure_kind(), Some(FailureKind::InternalError));
        assert!(outcome.message().unwrap().contains("backend offline"));
    }

    #[tokio::test]
    async fn tool_denial_translates_to_access_denied() {
        let descriptor = ToolDescriptor::builder(ToolId::new("scoped").unwrap())
            .build()
            .unwrap();
        let registry = Arc::new(ToolRegistry::new());
        registry
            .register(descriptor, |_params: Map<String, Value>, _ctx: ExecutionContext| async move {
                Err::<Value, _>(ToolError::denied("path `/etc` is outside the allow-list"))
            })
            .unwrap();
        let executor = ToolExecutor::new(registry);

        let outcome = executor
            .execute(
                &ToolId::new("scoped").unwrap(),
                Map::new(),
                &ExecutionContext::default(),
            )
            .await;

        assert_eq!(outcome.failure_kind(), Some(FailureKind::AccessDenied));
    }

    #[tokio::test]
    async fn oversized_payload_is_truncated_not_failed() {
        let counter = Arc::new(AtomicUsize::new(0));
        let executor = executor_with(echo_descriptor(false), counter);

        let ctx = ExecutionContext::builder()
            .limits(ResourceLimits::new().with_max_output_size_bytes(5))
            .build();
        let outcome = executor
            .execute(&ToolId::new("echo").unwrap(), params("hello world"), &ctx)
            .await;

        assert!(outcome.is_success());
        assert!(outcome.is_truncated());
        assert_eq!(outcome.payload(), &json!("hello"));
    }

    #[tokio::test]
    async fn metrics_record_success_and_failure() {
        let counter = Arc::new(AtomicUsize::new(0));
        let metrics = Arc::new(InMemoryMetrics::new());
        let executor =
            executor_with(echo_descriptor(false), counter).with_metrics(metrics.clone());

        let ctx = ExecutionContext::default();
        let id = ToolId::new("echo").unwrap();
        executor.execute(&id, params("hello"), &ctx).await;
        executor.execute(&id, Map::new(), &ctx).await;

        assert_eq!(metrics.invocations(), 2);
        let tool = metrics.tool(&id);
        assert_eq!(tool.successes, 1);
        assert_eq!(tool.failures, 1);
        assert!(tool.total_bytes > 0);
    }
}
