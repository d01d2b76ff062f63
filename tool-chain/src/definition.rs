//! Declarative chain and step definitions.

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tool_primitives::ToolId;

use crate::error::ChainError;
use crate::graph::ChainGraph;

/// What the scheduler does when a step fails.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ErrorPolicy {
    /// Halt the chain: in-flight steps finish, nothing new starts, and the
    /// run is marked failed. This is the default.
    #[default]
    StopChain,
    /// Record the failure and keep going; dependents still unblock, seeing
    /// an error-shaped record for the failed step.
    Continue,
}

/// How a step's parameters are produced at launch time.
///
/// Static maps may embed `${steps.<id>.value}`-style references that are
/// resolved against the shared variable map immediately before invocation.
/// Closure bindings compute the whole map from the variable snapshot and are
/// not representable in the JSON wire form; they serialize as an absent
/// `parameters` field.
#[derive(Clone, Default)]
pub enum StepBinding {
    /// No parameters.
    #[default]
    Empty,
    /// Literal parameter map, with optional `${steps.…}` references.
    Static(Map<String, Value>),
    /// Function of the current variable snapshot.
    Dynamic(Arc<dyn Fn(&HashMap<String, Value>) -> Map<String, Value> + Send + Sync>),
}

impl StepBinding {
    pub(crate) fn is_wireless(&self) -> bool {
        matches!(self, Self::Empty | Self::Dynamic(_))
    }
}

impl std::fmt::Debug for StepBinding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Empty => f.write_str("Empty"),
            Self::Static(map) => f.debug_tuple("Static").field(map).finish(),
            Self::Dynamic(_) => f.write_str("Dynamic(..)"),
        }
    }
}

impl Serialize for StepBinding {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Static(map) => map.serialize(serializer),
            // Skipped at the field level; nothing meaningful to emit.
            Self::Empty | Self::Dynamic(_) => Map::new().serialize(serializer),
        }
    }
}

impl<'de> Deserialize<'de> for StepBinding {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Ok(Self::Static(Map::deserialize(deserializer)?))
    }
}

/// Gate deciding whether a step runs at all.
///
/// A reference condition names a value in the variable map using the same
/// `${steps.…}` syntax as bindings; the step runs when the resolved value is
/// truthy (anything but absent, `null`, or `false`). Predicate conditions
/// are arbitrary functions of the variable snapshot and have no JSON form.
#[derive(Clone)]
pub enum Condition {
    /// `${steps.…}` reference evaluated for truthiness.
    Reference(String),
    /// Arbitrary predicate over the variable snapshot.
    Predicate(Arc<dyn Fn(&HashMap<String, Value>) -> bool + Send + Sync>),
}

impl std::fmt::Debug for Condition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Reference(reference) => f.debug_tuple("Reference").field(reference).finish(),
            Self::Predicate(_) => f.write_str("Predicate(..)"),
        }
    }
}

impl Serialize for Condition {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Reference(reference) => serializer.serialize_str(reference),
            // Skipped at the field level; nothing meaningful to emit.
            Self::Predicate(_) => serializer.serialize_none(),
        }
    }
}

impl<'de> Deserialize<'de> for Condition {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Ok(Self::Reference(String::deserialize(deserializer)?))
    }
}

fn condition_is_wireless(condition: &Option<Condition>) -> bool {
    !matches!(condition, Some(Condition::Reference(_)))
}

/// One named step of a chain: which tool to run, with which parameters,
/// after which other steps, and under which condition.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChainStep {
    step_id: String,
    #[serde(rename = "capabilityId")]
    tool_id: ToolId,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    depends_on: Vec<String>,
    #[serde(
        rename = "parameters",
        default,
        skip_serializing_if = "StepBinding::is_wireless"
    )]
    binding: StepBinding,
    #[serde(default, skip_serializing_if = "condition_is_wireless")]
    condition: Option<Condition>,
    #[serde(default, skip_serializing_if = "is_default_policy")]
    error_policy: ErrorPolicy,
}

fn is_default_policy(policy: &ErrorPolicy) -> bool {
    *policy == ErrorPolicy::default()
}

impl ChainStep {
    /// Creates a step invoking the supplied tool.
    ///
    /// # Errors
    ///
    /// Returns [`ChainError::InvalidStepId`] when the step identifier does
    /// not follow the tool-identifier lexical rules.
    pub fn new(step_id: impl Into<String>, tool_id: ToolId) -> Result<Self, ChainError> {
        let step_id = step_id.into();
        if let Err(err) = ToolId::new(step_id.as_str()) {
            return Err(ChainError::InvalidStepId {
                id: step_id,
                reason: err.to_string(),
            });
        }

        Ok(Self {
            step_id,
            tool_id,
            depends_on: Vec::new(),
            binding: StepBinding::Empty,
            condition: None,
            error_policy: ErrorPolicy::default(),
        })
    }

    /// Sets a static parameter map, optionally containing `${steps.…}`
    /// references.
    #[must_use]
    pub fn with_parameters(mut self, parameters: Map<String, Value>) -> Self {
        self.binding = StepBinding::Static(parameters);
        self
    }

    /// Sets a closure binding computed from the variable snapshot at launch
    /// time.
    #[must_use]
    pub fn with_binding<F>(mut self, binding: F) -> Self
    where
        F: Fn(&HashMap<String, Value>) -> Map<String, Value> + Send + Sync + 'static,
    {
        self.binding = StepBinding::Dynamic(Arc::new(binding));
        self
    }

    /// Declares a dependency on another step.
    #[must_use]
    pub fn depends_on(mut self, step_id: impl Into<String>) -> Self {
        self.depends_on.push(step_id.into());
        self
    }

    /// Gates the step on a `${steps.…}` reference being truthy.
    #[must_use]
    pub fn when_reference(mut self, reference: impl Into<String>) -> Self {
        self.condition = Some(Condition::Reference(reference.into()));
        self
    }

    /// Gates the step on an arbitrary predicate over the variable snapshot.
    #[must_use]
    pub fn when<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&HashMap<String, Value>) -> bool + Send + Sync + 'static,
    {
        self.condition = Some(Condition::Predicate(Arc::new(predicate)));
        self
    }

    /// Sets the error policy applied when this step fails.
    #[must_use]
    pub const fn with_error_policy(mut self, error_policy: ErrorPolicy) -> Self {
        self.error_policy = error_policy;
        self
    }

    /// Shorthand for [`ErrorPolicy::Continue`].
    #[must_use]
    pub const fn continue_on_failure(self) -> Self {
        self.with_error_policy(ErrorPolicy::Continue)
    }

    /// Returns the step identifier.
    #[must_use]
    pub fn step_id(&self) -> &str {
        &self.step_id
    }

    /// Returns the identifier of the tool this step invokes.
    #[must_use]
    pub fn tool_id(&self) -> &ToolId {
        &self.tool_id
    }

    /// Returns the declared dependency step identifiers.
    #[must_use]
    pub fn dependencies(&self) -> &[String] {
        &self.depends_on
    }

    /// Returns the parameter binding.
    #[must_use]
    pub const fn binding(&self) -> &StepBinding {
        &self.binding
    }

    /// Returns the gating condition, if any.
    #[must_use]
    pub const fn condition(&self) -> Option<&Condition> {
        self.condition.as_ref()
    }

    /// Returns the declared error policy.
    #[must_use]
    pub const fn error_policy(&self) -> ErrorPolicy {
        self.error_policy
    }
}

/// A named DAG of steps. Declaration order carries no scheduling meaning;
/// execution order is derived from dependencies alone.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChainDefinition {
    id: String,
    name: String,
    steps: Vec<ChainStep>,
}

impl ChainDefinition {
    /// Starts building a chain with the supplied identifier and name.
    #[must_use]
    pub fn builder(id: impl Into<String>, name: impl Into<String>) -> ChainDefinitionBuilder {
        ChainDefinitionBuilder {
            id: id.into(),
            name: name.into(),
            steps: Vec::new(),
        }
    }

    /// Returns the chain identifier.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Returns the human-readable chain name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the declared steps.
    #[must_use]
    pub fn steps(&self) -> &[ChainStep] {
        &self.steps
    }
}

/// Builder for [`ChainDefinition`].
pub struct ChainDefinitionBuilder {
    id: String,
    name: String,
    steps: Vec<ChainStep>,
}

impl ChainDefinitionBuilder {
    /// Adds a step to the chain.
    #[must_use]
    pub fn step(mut self, step: ChainStep) -> Self {
        self.steps.push(step);
        self
    }

    /// Finalises the chain, validating the dependency graph.
    ///
    /// # Errors
    ///
    /// Returns a [`ChainError`] when the chain is empty, a step id is
    /// duplicated or malformed, a dependency names an unknown step, or the
    /// dependency relation contains a cycle.
    pub fn build(self) -> Result<ChainDefinition, ChainError> {
        let chain = ChainDefinition {
            id: self.id,
            name: self.name,
            steps: self.steps,
        };
        ChainGraph::build(&chain)?;
        Ok(chain)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn tool(id: &str) -> ToolId {
        ToolId::new(id).unwrap()
    }

    #[test]
    fn builder_validates_the_graph() {
        let chain = ChainDefinition::builder("report", "Daily report")
            .step(ChainStep::new("read", tool("file.read")).unwrap())
            .step(
                ChainStep::new("transform", tool("text.upper"))
                    .unwrap()
                    .depends_on("read"),
            )
            .build()
            .unwrap();

        assert_eq!(chain.id(), "report");
        assert_eq!(chain.steps().len(), 2);
        assert_eq!(chain.steps()[1].dependencies(), ["read"]);
    }

    #[test]
    fn cyclic_chain_is_rejected_at_build_time() {
        let err = ChainDefinition::builder("loop", "Loop")
            .step(
                ChainStep::new("a", tool("echo"))
                    .unwrap()
                    .depends_on("b"),
            )
            .step(
                ChainStep::new("b", tool("echo"))
                    .unwrap()
                    .depends_on("a"),
            )
            .build()
            .unwrap_err();

        assert!(matches!(err, ChainError::CyclicDependency { .. }));
    }

    #[test]
    fn malformed_step_id_is_rejected() {
        let err = ChainStep::new("Bad Step", tool("echo")).unwrap_err();
        assert!(matches!(err, ChainError::InvalidStepId { .. }));
    }

    #[test]
    fn deserializes_the_documented_wire_shape() {
        let chain: ChainDefinition = serde_json::from_value(json!({
            "id": "report",
            "name": "Daily report",
            "steps": [
                {
                    "stepId": "read",
                    "capabilityId": "file.read",
                    "parameters": {"path": "in.txt"}
                },
                {
                    "stepId": "transform",
                    "capabilityId": "text.upper",
                    "dependsOn": ["read"],
                    "condition": "${steps.read.success}",
                    "parameters": {"text": "${steps.read.value}"},
                    "errorPolicy": "continue"
                }
            ]
        }))
        .unwrap();

        assert_eq!(chain.steps().len(), 2);
        let transform = &chain.steps()[1];
        assert_eq!(transform.tool_id().as_str(), "text.upper");
        assert_eq!(transform.error_policy(), ErrorPolicy::Continue);
        assert!(matches!(
            transform.condition(),
            Some(Condition::Reference(reference)) if reference == "${steps.read.success}"
        ));
        assert!(matches!(transform.binding(), StepBinding::Static(_)));
    }

    #[test]
    fn closure_bindings_round_trip_as_absent_fields() {
        let step = ChainStep::new("dynamic", tool("echo"))
            .unwrap()
            .with_binding(|_vars| Map::new())
            .when(|_vars| true);

        let encoded = serde_json::to_value(&step).unwrap();
        assert_eq!(encoded.get("parameters"), None);
        assert_eq!(encoded.get("condition"), None);
    }
}
