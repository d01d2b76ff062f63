//! Registry storing tool handles keyed by identifier.

use std::collections::HashMap;
use std::sync::RwLock;

use tool_primitives::{ToolDescriptor, ToolId};
use tracing::debug;

use crate::capability::{Capability, ToolHandle};
use crate::error::ToolError;

/// Registry that owns registered tool handles.
///
/// The registry is the single lookup point the execution governor resolves
/// tool identifiers through. Handles are cheap to clone, so lookups hand out
/// clones and never hold the lock across an invocation.
#[derive(Default)]
pub struct ToolRegistry {
    inner: RwLock<HashMap<ToolId, ToolHandle>>,
}

impl std::fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.inner.read().expect("tool registry poisoned");
        let ids: Vec<_> = inner.keys().map(ToolId::as_str).collect();
        f.debug_struct("ToolRegistry")
            .field("registered", &ids)
            .finish()
    }
}

impl ToolRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a capability under its descriptor's identifier.
    ///
    /// # Errors
    ///
    /// Returns [`ToolError::DuplicateTool`] if the identifier is already
    /// present.
    ///
    /// # Panics
    ///
    /// Panics if the internal registry lock is poisoned.
    pub fn register<C>(&self, descriptor: ToolDescriptor, capability: C) -> Result<(), ToolError>
    where
        C: Capability + 'static,
    {
        self.register_handle(ToolHandle::new(descriptor, capability))
    }

    /// Registers an already-constructed handle.
    ///
    /// # Errors
    ///
    /// Returns [`ToolError::DuplicateTool`] if the identifier is already
    /// present.
    ///
    /// # Panics
    ///
    /// Panics if the internal registry lock is poisoned.
    pub fn register_handle(&self, handle: ToolHandle) -> Result<(), ToolError> {
        let mut inner = self.inner.write().expect("tool registry poisoned");
        let id = handle.descriptor().id().clone();
        if inner.contains_key(&id) {
            return Err(ToolError::DuplicateTool { id });
        }

        debug!(tool = %id, "tool registered");
        inner.insert(id, handle);
        Ok(())
    }

    /// Returns a handle to the tool matching the supplied identifier.
    #[must_use]
    pub fn get(&self, id: &ToolId) -> Option<ToolHandle> {
        let inner = self.inner.read().ok()?;
        inner.get(id).cloned()
    }

    /// Removes a registration, returning the handle if one was present.
    ///
    /// # Panics
    ///
    /// Panics if the internal registry lock is poisoned.
    pub fn remove(&self, id: &ToolId) -> Option<ToolHandle> {
        let mut inner = self.inner.write().expect("tool registry poisoned");
        let removed = inner.remove(id);
        if removed.is_some() {
            debug!(tool = %id, "tool removed");
        }
        removed
    }

    /// Returns `true` when a tool is registered under the identifier.
    ///
    /// # Panics
    ///
    /// Panics if the internal registry lock is poisoned.
    #[must_use]
    pub fn contains(&self, id: &ToolId) -> bool {
        let inner = self.inner.read().expect("tool registry poisoned");
        inner.contains_key(id)
    }

    /// Lists the descriptors of all registered tools.
    ///
    /// # Panics
    ///
    /// Panics if the internal registry lock is poisoned.
    #[must_use]
    pub fn list(&self) -> Vec<ToolDescriptor> {
        let inner = self.inner.read().expect("tool registry poisoned");
        inner
            .values()
            .map(|handle| handle.descriptor().clone())
            .collect()
    }

    /// Returns the number of registered tools.
    ///
    /// # Panics
    ///
    /// Panics if the internal registry lock is poisoned.
    #[must_use]
    pub fn len(&self) -> usize {
        let inner = self.inner.read().expect("tool registry poisoned");
        inner.len()
    }

    /// Returns `true` when no tools are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use serde_json::{Map, Value};
    use tool_primitives::ExecutionContext;

    fn descriptor(id: &str) -> ToolDescriptor {
        ToolDescriptor::builder(ToolId::new(id).unwrap())
            .description("Echo incoming parameters")
            .build()
            .unwrap()
    }

    fn echo(
        params: Map<String, Value>,
        _ctx: ExecutionContext,
    ) -> impl Future<Output = crate::CapabilityResult<Value>> {
        async move { Ok(Value::Object(params)) }
    }

    #[tokio::test]
    async fn register_and_resolve_tool() {
        let registry = ToolRegistry::new();
        registry.register(descriptor("echo"), echo).unwrap();

        let id = ToolId::new("echo").unwrap();
        assert!(registry.contains(&id));
        assert_eq!(registry.len(), 1);

        let handle = registry.get(&id).expect("handle");
        let mut params = Map::new();
        params.insert("message".into(), Value::from("hi"));

        let ctx = ExecutionContext::default();
        let output = handle.execute(params.clone(), &ctx).await.unwrap();
        assert_eq!(output, Value::Object(params));
    }

    #[test]
    fn duplicate_registration_errors() {
        let registry = ToolRegistry::new();
        registry.register(descriptor("echo"), echo).unwrap();

        let err = registry
            .register(descriptor("echo"), echo)
            .expect_err("duplicate registration should fail");

        assert!(matches!(err, ToolError::DuplicateTool { id } if id.as_str() == "echo"));
    }

    #[test]
    fn remove_clears_registration() {
        let registry = ToolRegistry::new();
        registry.register(descriptor("echo"), echo).unwrap();

        let id = ToolId::new("echo").unwrap();
        assert!(registry.remove(&id).is_some());
        assert!(!registry.contains(&id));
        assert!(registry.remove(&id).is_none());
        assert!(registry.is_empty());
    }

    #[test]
    fn list_returns_descriptor_snapshots() {
        let registry = ToolRegistry::new();
        registry.register(descriptor("echo"), echo).unwrap();
        registry.register(descriptor("text.upper"), echo).unwrap();

        let mut ids: Vec<String> = registry
            .list()
            .iter()
            .map(|descriptor| descriptor.id().as_str().to_owned())
            .collect();
        ids.sort();
        assert_eq!(ids, ["echo", "text.upper"]);
    }
}
