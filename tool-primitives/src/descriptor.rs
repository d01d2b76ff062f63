//! Self-describing tool descriptors consumed by the execution governor.

use std::collections::BTreeSet;

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Error, Result};
use crate::ids::ToolId;
use crate::permissions::PermissionClass;

/// Type tag declared for a tool parameter.
///
/// Values are the standard JSON shapes; `null` is never a declared type and
/// is treated as an absent value during validation.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParameterType {
    /// UTF-8 text.
    String,
    /// Integer or floating point number.
    Number,
    /// `true` or `false`.
    Boolean,
    /// Ordered sequence of values.
    List,
    /// String-keyed map of values.
    Map,
}

impl ParameterType {
    /// Returns `true` when the supplied value matches this type tag.
    #[must_use]
    pub fn matches(self, value: &Value) -> bool {
        match self {
            Self::String => value.is_string(),
            Self::Number => value.is_number(),
            Self::Boolean => value.is_boolean(),
            Self::List => value.is_array(),
            Self::Map => value.is_object(),
        }
    }

    /// Stable lowercase label used in validation messages.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Number => "number",
            Self::Boolean => "boolean",
            Self::List => "list",
            Self::Map => "map",
        }
    }
}

/// Declaration of a single tool parameter and its constraints.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ParameterSpec {
    name: String,
    kind: ParameterType,
    required: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    default: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    min: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    max: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    min_length: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    max_length: Option<usize>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    allowed_values: Vec<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pattern: Option<String>,
}

impl ParameterSpec {
    /// Declares a parameter the caller must always supply.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidParameterSpec`] if the name is empty.
    pub fn required(name: impl Into<String>, kind: ParameterType) -> Result<Self> {
        Self::new(name, kind, true)
    }

    /// Declares a parameter the caller may omit.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidParameterSpec`] if the name is empty.
    pub fn optional(name: impl Into<String>, kind: ParameterType) -> Result<Self> {
        Self::new(name, kind, false)
    }

    fn new(name: impl Into<String>, kind: ParameterType, required: bool) -> Result<Self> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(Error::InvalidParameterSpec {
                name,
                reason: "parameter name cannot be empty".into(),
            });
        }

        Ok(Self {
            name,
            kind,
            required,
            default: None,
            min: None,
            max: None,
            min_length: None,
            max_length: None,
            allowed_values: Vec::new(),
            pattern: None,
        })
    }

    /// Sets the value substituted when an optional parameter is absent.
    #[must_use]
    pub fn with_default(mut self, default: Value) -> Self {
        self.default = Some(default);
        self
    }

    /// Sets the inclusive lower bound for numeric values.
    #[must_use]
    pub fn with_min(mut self, min: f64) -> Self {
        self.min = Some(min);
        self
    }

    /// Sets the inclusive upper bound for numeric values.
    #[must_use]
    pub fn with_max(mut self, max: f64) -> Self {
        self.max = Some(max);
        self
    }

    /// Sets the minimum length for string values, in characters.
    #[must_use]
    pub fn with_min_length(mut self, min_length: usize) -> Self {
        self.min_length = Some(min_length);
        self
    }

    /// Sets the maximum length for string values, in characters.
    #[must_use]
    pub fn with_max_length(mut self, max_length: usize) -> Self {
        self.max_length = Some(max_length);
        self
    }

    /// Restricts the parameter to the supplied set of values.
    #[must_use]
    pub fn with_allowed_values(mut self, allowed_values: Vec<Value>) -> Self {
        self.allowed_values = allowed_values;
        self
    }

    /// Requires string values to match the supplied regular expression.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidParameterSpec`] if the pattern does not
    /// compile.
    pub fn with_pattern(mut self, pattern: impl Into<String>) -> Result<Self> {
        let pattern = pattern.into();
        if let Err(err) = Regex::new(&pattern) {
            return Err(Error::InvalidParameterSpec {
                name: self.name,
                reason: format!("pattern does not compile: {err}"),
            });
        }
        self.pattern = Some(pattern);
        Ok(self)
    }

    /// Returns the parameter name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the declared type tag.
    #[must_use]
    pub const fn kind(&self) -> ParameterType {
        self.kind
    }

    /// Returns `true` when the caller must supply this parameter.
    #[must_use]
    pub const fn is_required(&self) -> bool {
        self.required
    }

    /// Returns the default value, if declared.
    #[must_use]
    pub fn default(&self) -> Option<&Value> {
        self.default.as_ref()
    }

    /// Returns the inclusive numeric lower bound, if declared.
    #[must_use]
    pub const fn min(&self) -> Option<f64> {
        self.min
    }

    /// Returns the inclusive numeric upper bound, if declared.
    #[must_use]
    pub const fn max(&self) -> Option<f64> {
        self.max
    }

    /// Returns the minimum string length, if declared.
    #[must_use]
    pub const fn min_length(&self) -> Option<usize> {
        self.min_length
    }

    /// Returns the maximum string length, if declared.
    #[must_use]
    pub const fn max_length(&self) -> Option<usize> {
        self.max_length
    }

    /// Returns the closed value set, empty when unrestricted.
    #[must_use]
    pub fn allowed_values(&self) -> &[Value] {
        &self.allowed_values
    }

    /// Returns the regular expression pattern, if declared.
    #[must_use]
    pub fn pattern(&self) -> Option<&str> {
        self.pattern.as_deref()
    }
}

/// Immutable description of a tool: identity, parameters, permissions, and
/// cacheability.
///
/// The execution governor reads descriptors to validate parameters and check
/// permission grants before a tool ever runs.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ToolDescriptor {
    id: ToolId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    description: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    parameters: Vec<ParameterSpec>,
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    required_permissions: BTreeSet<PermissionClass>,
    #[serde(default)]
    cacheable: bool,
}

impl ToolDescriptor {
    /// Starts building a descriptor for the supplied tool identifier.
    #[must_use]
    pub fn builder(id: ToolId) -> ToolDescriptorBuilder {
        ToolDescriptorBuilder {
            id,
            description: None,
            parameters: Vec::new(),
            required_permissions: BTreeSet::new(),
            cacheable: false,
        }
    }

    /// Returns the unique tool identifier.
    #[must_use]
    pub fn id(&self) -> &ToolId {
        &self.id
    }

    /// Optional human-readable description.
    #[must_use]
    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    /// Declared parameter specifications.
    #[must_use]
    pub fn parameters(&self) -> &[ParameterSpec] {
        &self.parameters
    }

    /// Looks up a parameter specification by name.
    #[must_use]
    pub fn parameter(&self, name: &str) -> Option<&ParameterSpec> {
        self.parameters.iter().find(|spec| spec.name() == name)
    }

    /// Permission classes the caller must grant before invocation.
    #[must_use]
    pub fn required_permissions(&self) -> &BTreeSet<PermissionClass> {
        &self.required_permissions
    }

    /// Returns `true` when successful results may be served from the cache.
    #[must_use]
    pub const fn is_cacheable(&self) -> bool {
        self.cacheable
    }
}

/// Builder for [`ToolDescriptor`].
pub struct ToolDescriptorBuilder {
    id: ToolId,
    description: Option<String>,
    parameters: Vec<ParameterSpec>,
    required_permissions: BTreeSet<PermissionClass>,
    cacheable: bool,
}

impl ToolDescriptorBuilder {
    /// Sets the human-readable description.
    #[must_use]
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Declares a parameter.
    #[must_use]
    pub fn parameter(mut self, spec: ParameterSpec) -> Self {
        self.parameters.push(spec);
        self
    }

    /// Adds a permission class the caller must grant.
    #[must_use]
    pub fn requires(mut self, class: PermissionClass) -> Self {
        self.required_permissions.insert(class);
        self
    }

    /// Marks successful results as eligible for the result cache.
    #[must_use]
    pub fn cacheable(mut self, cacheable: bool) -> Self {
        self.cacheable = cacheable;
        self
    }

    /// Finalises the descriptor.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidDescriptor`] when two parameters share a name.
    pub fn build(self) -> Result<ToolDescriptor> {
        let mut seen = BTreeSet::new();
        for spec in &self.parameters {
            if !seen.insert(spec.name()) {
                return Err(Error::InvalidDescriptor {
                    reason: format!("duplicate parameter `{}`", spec.name()),
                });
            }
        }

        Ok(ToolDescriptor {
            id: self.id,
            description: self.description,
            parameters: self.parameters,
            required_permissions: self.required_permissions,
            cacheable: self.cacheable,
        })
    }
}
