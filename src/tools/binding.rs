//! Argument binding against a tool's input schema.
//!
//! Models produce tool arguments as free-form JSON. Before a handler runs,
//! the arguments are checked against the declared schema: required fields
//! must be present, declared types must match, undeclared fields are refused
//! (unless the schema sets `additionalProperties: true`) and declared
//! defaults fill in omitted fields.

use serde_json::{Map, Value};

use super::{ToolError, ToolResult, ToolSpec};

/// Arguments that passed schema binding.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolArguments {
    tool: String,
    values: Map<String, Value>,
}

impl ToolArguments {
    /// Raw bound value of an argument.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }

    /// Required string argument.
    pub fn str(&self, name: &str) -> ToolResult<&str> {
        self.get(name)
            .and_then(Value::as_str)
            .ok_or_else(|| self.invalid(format!("`{}` must be a string", name)))
    }

    /// Required non-negative integer argument.
    pub fn u64(&self, name: &str) -> ToolResult<u64> {
        self.get(name)
            .and_then(Value::as_u64)
            .ok_or_else(|| self.invalid(format!("`{}` must be a non-negative integer", name)))
    }

    /// All bound arguments as a JSON object.
    pub fn as_value(&self) -> Value {
        Value::Object(self.values.clone())
    }

    pub fn into_value(self) -> Value {
        Value::Object(self.values)
    }

    fn invalid(&self, reason: String) -> ToolError {
        ToolError::InvalidArguments {
            tool: self.tool.clone(),
            reason,
        }
    }
}

/// Bind `arguments` against the input schema of `spec`.
///
/// `null` is accepted as "no arguments". Integers sent as whole floats
/// (`5.0`) are narrowed to integers.
///
/// # Errors
/// Returns a human-readable reason when the arguments do not fit the schema
pub fn bind_arguments(spec: &ToolSpec, arguments: &Value) -> Result<ToolArguments, String> {
    let provided = match arguments {
        Value::Null => Map::new(),
        Value::Object(map) => map.clone(),
        other => return Err(format!("arguments must be an object, got {}", type_name(other))),
    };

    let schema = &spec.input_schema;
    let empty = Map::new();
    let properties = schema
        .get("properties")
        .and_then(Value::as_object)
        .unwrap_or(&empty);
    let allow_extra = schema
        .get("additionalProperties")
        .and_then(Value::as_bool)
        .unwrap_or(false);

    let mut values = Map::new();
    for (name, value) in provided {
        match properties.get(&name) {
            Some(property) => {
                let value = check_type(&name, property, value)?;
                values.insert(name, value);
            }
            None if allow_extra => {
                values.insert(name, value);
            }
            None => return Err(format!("unexpected argument `{}`", name)),
        }
    }

    let required = schema
        .get("required")
        .and_then(Value::as_array)
        .map(|names| names.iter().filter_map(Value::as_str).collect::<Vec<_>>())
        .unwrap_or_default();
    for name in required {
        if !values.contains_key(name) {
            return Err(format!("missing required argument `{}`", name));
        }
    }

    for (name, property) in properties {
        if values.contains_key(name) {
            continue;
        }
        if let Some(default) = property.get("default") {
            values.insert(name.clone(), default.clone());
        }
    }

    Ok(ToolArguments {
        tool: spec.name.clone(),
        values,
    })
}

fn check_type(name: &str, property: &Value, value: Value) -> Result<Value, String> {
    let expected: Vec<&str> = match property.get("type") {
        Some(Value::String(t)) => vec![t.as_str()],
        Some(Value::Array(ts)) => ts.iter().filter_map(Value::as_str).collect(),
        _ => return Ok(value),
    };

    for ty in &expected {
        if let Some(bound) = coerce(ty, &value) {
            return Ok(bound);
        }
    }

    Err(format!(
        "argument `{}` must be of type {}, got {}",
        name,
        expected.join(" or "),
        type_name(&value)
    ))
}

fn coerce(ty: &str, value: &Value) -> Option<Value> {
    let ok = match ty {
        "string" => value.is_string(),
        "number" => value.is_number(),
        "boolean" => value.is_boolean(),
        "array" => value.is_array(),
        "object" => value.is_object(),
        "null" => value.is_null(),
        "integer" => {
            if value.is_i64() || value.is_u64() {
                true
            } else {
                return value
                    .as_f64()
                    .filter(|f| f.fract() == 0.0 && f.abs() < i64::MAX as f64)
                    .map(|f| Value::from(f as i64));
            }
        }
        // Unknown type keywords are not enforced
        _ => true,
    };
    ok.then(|| value.clone())
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(n) if n.is_f64() => "number",
        Value::Number(_) => "integer",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn spec() -> ToolSpec {
        ToolSpec::new(
            "search_papers",
            "Search",
            json!({
                "type": "object",
                "properties": {
                    "topic": {"type": "string"},
                    "max_results": {"type": "integer", "default": 5}
                },
                "required": ["topic"]
            }),
        )
    }

    #[test]
    fn test_defaults_are_applied() {
        let args = bind_arguments(&spec(), &json!({"topic": "physics"})).unwrap();
        assert_eq!(args.str("topic").unwrap(), "physics");
        assert_eq!(args.u64("max_results").unwrap(), 5);
    }

    #[test]
    fn test_explicit_value_overrides_default() {
        let args = bind_arguments(&spec(), &json!({"topic": "x", "max_results": 2})).unwrap();
        assert_eq!(args.u64("max_results").unwrap(), 2);
    }

    #[test]
    fn test_whole_float_is_accepted_as_integer() {
        let args = bind_arguments(&spec(), &json!({"topic": "x", "max_results": 3.0})).unwrap();
        assert_eq!(args.get("max_results"), Some(&json!(3)));
    }

    #[test]
    fn test_missing_required_field() {
        let err = bind_arguments(&spec(), &json!({"max_results": 1})).unwrap_err();
        assert_eq!(err, "missing required argument `topic`");
    }

    #[test]
    fn test_wrong_type() {
        let err = bind_arguments(&spec(), &json!({"topic": 7})).unwrap_err();
        assert_eq!(err, "argument `topic` must be of type string, got integer");

        let err = bind_arguments(&spec(), &json!({"topic": "x", "max_results": 2.5})).unwrap_err();
        assert!(err.contains("must be of type integer"));
    }

    #[test]
    fn test_unexpected_field() {
        let err = bind_arguments(&spec(), &json!({"topic": "x", "sort": "date"})).unwrap_err();
        assert_eq!(err, "unexpected argument `sort`");
    }

    #[test]
    fn test_additional_properties_allowed_when_declared() {
        let open = ToolSpec::new(
            "open",
            "Open schema",
            json!({"type": "object", "properties": {}, "additionalProperties": true}),
        );
        let args = bind_arguments(&open, &json!({"anything": [1, 2]})).unwrap();
        assert_eq!(args.get("anything"), Some(&json!([1, 2])));
    }

    #[test]
    fn test_null_arguments_and_non_object() {
        let no_args = ToolSpec::new("ping", "Ping", json!({"type": "object", "properties": {}}));
        assert!(bind_arguments(&no_args, &Value::Null).is_ok());
        let err = bind_arguments(&no_args, &json!("text")).unwrap_err();
        assert_eq!(err, "arguments must be an object, got string");
    }

    #[test]
    fn test_accessor_errors_name_the_tool() {
        let args = bind_arguments(&spec(), &json!({"topic": "x"})).unwrap();
        let err = args.str("missing").unwrap_err();
        assert!(matches!(err, ToolError::InvalidArguments { tool, .. } if tool == "search_papers"));
    }
}
