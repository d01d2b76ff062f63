//! The capability contract tools implement.

use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Map, Value};
use tool_primitives::{ExecutionContext, ToolDescriptor};

use crate::error::ToolError;

/// Result alias for capability execution.
pub type CapabilityResult<T> = Result<T, ToolError>;

/// A single unit of executable work.
///
/// Implementations receive validated parameters and the run's execution
/// context and return a JSON payload. Faults are reported through the error
/// channel; the governor converts them into failed outcomes, so an `Err`
/// here never escapes to callers as a raised error.
#[async_trait]
pub trait Capability: Send + Sync {
    /// Executes the capability with validated parameters.
    async fn execute(
        &self,
        params: Map<String, Value>,
        ctx: &ExecutionContext,
    ) -> CapabilityResult<Value>;
}

#[async_trait]
impl<F, Fut> Capability for F
where
    F: Send + Sync + Fn(Map<String, Value>, ExecutionContext) -> Fut,
    Fut: Future<Output = CapabilityResult<Value>> + Send,
{
    async fn execute(
        &self,
        params: Map<String, Value>,
        ctx: &ExecutionContext,
    ) -> CapabilityResult<Value> {
        (self)(params, ctx.clone()).await
    }
}

/// Handle pairing a descriptor with its capability implementation.
///
/// Handles are what the registry hands out; the governor reads the
/// descriptor for validation and permission checks and then executes
/// through the same handle.
#[derive(Clone)]
pub struct ToolHandle {
    descriptor: Arc<ToolDescriptor>,
    capability: Arc<dyn Capability>,
}

impl ToolHandle {
    /// Creates a handle from a descriptor and implementation.
    pub fn new<C>(descriptor: ToolDescriptor, capability: C) -> Self
    where
        C: Capability + 'static,
    {
        Self {
            descriptor: Arc::new(descriptor),
            capability: Arc::new(capability),
        }
    }

    /// Returns the descriptor for this tool.
    #[must_use]
    pub fn descriptor(&self) -> &ToolDescriptor {
        &self.descriptor
    }

    /// Executes the underlying capability.
    ///
    /// # Errors
    ///
    /// Propagates whatever [`ToolError`] the implementation reports.
    pub async fn execute(
        &self,
        params: Map<String, Value>,
        ctx: &ExecutionContext,
    ) -> CapabilityResult<Value> {
        self.capability.execute(params, ctx).await
    }
}

impl std::fmt::Debug for ToolHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolHandle")
            .field("id", &self.descriptor.id().as_str())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tool_primitives::ToolId;

    fn descriptor() -> ToolDescriptor {
        ToolDescriptor::builder(ToolId::new("echo").unwrap())
            .description("Echo incoming parameters")
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn closure_implements_capability() {
        let handle = ToolHandle::new(
            descriptor(),
            |params: Map<String, Value>, _ctx: ExecutionContext| async move {
                Ok(Value::Object(params))
            },
        );

        let mut params = Map::new();
        params.insert("message".into(), Value::from("hello"));

        let ctx = ExecutionContext::default();
        let output = handle.execute(params.clone(), &ctx).await.unwrap();
        assert_eq!(output, Value::Object(params));
    }

    #[tokio::test]
    async fn capability_errors_propagate_through_handle() {
        let handle = ToolHandle::new(
            descriptor(),
            |_params: Map<String, Value>, _ctx: ExecutionContext| async move {
                Err::<Value, _>(ToolError::execution("backend offline"))
            },
        );

        let ctx = ExecutionContext::default();
        let err = handle.execute(Map::new(), &ctx).await.unwrap_err();
        assert!(matches!(err, ToolError::Execution { .. }));
    }
}
