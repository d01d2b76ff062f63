//! Parameter validation against a tool descriptor.

use regex::Regex;
use serde_json::{Map, Value};
use tool_primitives::{ParameterSpec, ToolDescriptor};

/// Validates the supplied parameters against the descriptor's specs.
///
/// Returns the effective parameter map with declared defaults filled in for
/// absent optional parameters, or a human-readable rejection message. A JSON
/// `null` counts as an absent value. Parameters the descriptor does not
/// declare are passed through untouched.
pub(crate) fn validate_parameters(
    descriptor: &ToolDescriptor,
    mut params: Map<String, Value>,
) -> Result<Map<String, Value>, String> {
    for spec in descriptor.parameters() {
        let supplied = params.get(spec.name()).filter(|value| !value.is_null());

        let Some(value) = supplied else {
            if spec.is_required() {
                return Err(format!("required parameter `{}` is missing", spec.name()));
            }
            if let Some(default) = spec.default() {
                params.insert(spec.name().to_owned(), default.clone());
            } else {
                params.remove(spec.name());
            }
            continue;
        };

        check_value(spec, value)?;
    }

    Ok(params)
}

fn check_value(spec: &ParameterSpec, value: &Value) -> Result<(), String> {
    if !spec.kind().matches(value) {
        return Err(format!(
            "parameter `{}` must be a {}",
            spec.name(),
            spec.kind().label()
        ));
    }

    if let Some(number) = value.as_f64() {
        if let Some(min) = spec.min()
            && number < min
        {
            return Err(format!(
                "parameter `{}` must be >= {min}, got {number}",
                spec.name()
            ));
        }
        if let Some(max) = spec.max()
            && number > max
        {
            return Err(format!(
                "parameter `{}` must be <= {max}, got {number}",
                spec.name()
            ));
        }
    }

    if let Some(text) = value.as_str() {
        let length = text.chars().count();
        if let Some(min_length) = spec.min_length()
            && length < min_length
        {
            return Err(format!(
                "parameter `{}` must be at least {min_length} characters",
                spec.name()
            ));
        }
        if let Some(max_length) = spec.max_length()
            && length > max_length
        {
            return Err(format!(
                "parameter `{}` must be at most {max_length} characters",
                spec.name()
            ));
        }
        if let Some(pattern) = spec.pattern() {
            // The descriptor builder verified the pattern compiles.
            let matched = Regex::new(pattern).is_ok_and(|regex| regex.is_match(text));
            if !matched {
                return Err(format!(
                    "parameter `{}` does not match pattern `{pattern}`",
                    spec.name()
                ));
            }
        }
    }

    if !spec.allowed_values().is_empty() && !spec.allowed_values().contains(value) {
        return Err(format!(
            "parameter `{}` is not one of the allowed values",
            spec.name()
        ));
    }

    Ok(())
}
