//! Lazy resolution of `${steps.…}` references against the variable map.

use std::collections::HashMap;

use serde_json::{Map, Value};

use crate::definition::{Condition, StepBinding};

/// Produces the effective parameter map for a step, immediately before
/// invocation, from the current variable snapshot.
///
/// String values of the exact form `${steps.<stepId>}`,
/// `${steps.<stepId>.value}`, or `${steps.<stepId>.value.<field>…}` are
/// replaced by the referenced value; references into absent, failed, or
/// skipped steps resolve to `null`. References inside nested lists and maps
/// are resolved recursively.
pub(crate) fn resolve_binding(
    binding: &StepBinding,
    vars: &HashMap<String, Value>,
) -> Map<String, Value> {
    match binding {
        StepBinding::Empty => Map::new(),
        StepBinding::Static(map) => map
            .iter()
            .map(|(key, value)| (key.clone(), resolve_value(value, vars)))
            .collect(),
        StepBinding::Dynamic(bind) => bind(vars),
    }
}

/// Evaluates a step's gating condition against the variable snapshot.
///
/// Reference conditions are truthy unless they resolve to absent, `null`, or
/// `false`.
pub(crate) fn evaluate_condition(condition: &Condition, vars: &HashMap<String, Value>) -> bool {
    match condition {
        Condition::Reference(reference) => {
            is_truthy(&lookup(reference, vars).unwrap_or(Value::Null))
        }
        Condition::Predicate(predicate) => predicate(vars),
    }
}

fn resolve_value(value: &Value, vars: &HashMap<String, Value>) -> Value {
    match value {
        Value::String(text) => lookup(text, vars).unwrap_or_else(|| value.clone()),
        Value::Array(items) => Value::Array(
            items
                .iter()
                .map(|item| resolve_value(item, vars))
                .collect(),
        ),
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(key, item)| (key.clone(), resolve_value(item, vars)))
                .collect(),
        ),
        other => other.clone(),
    }
}

/// Resolves a whole-string reference. Returns `None` for strings that are
/// not references, so literals pass through untouched; a well-formed
/// reference into missing data yields `Some(Value::Null)`.
fn lookup(text: &str, vars: &HashMap<String, Value>) -> Option<Value> {
    let inner = text.strip_prefix("${")?.strip_suffix('}')?;
    let mut segments = inner.split('.');
    if segments.next() != Some("steps") {
        return None;
    }
    let step_id = segments.next()?;

    let Some(record) = vars.get(step_id) else {
        return Some(Value::Null);
    };

    let mut current = record;
    for segment in segments {
        match current.get(segment) {
            Some(next) => current = next,
            None => return Some(Value::Null),
        }
    }
    Some(current.clone())
}

fn is_truthy(value: &Value) -> bool {
    !matches!(value, Value::Null | Value::Bool(false))
}
