//! Argument checks against a tool's declared JSON schema.
//!
//! Only the subset tools actually declare is enforced: the top-level object,
//! `required`, primitive `type` per property and `additionalProperties: false`.
//! Models frequently send scalars as strings, so `"42"` for an integer or
//! `"true"` for a boolean is coerced before the type check.

use serde_json::{Map, Value};

/// Coerce a JSON string to the declared primitive type when it parses.
#[must_use]
pub fn coerce_value(value: &Value, target_type: &str) -> Value {
    let Value::String(s) = value else {
        return value.clone();
    };

    let coerced = match target_type {
        "number" => s
            .trim()
            .parse::<f64>()
            .ok()
            .and_then(serde_json::Number::from_f64)
            .map(Value::Number),
        "integer" => s.trim().parse::<i64>().ok().map(|n| Value::Number(n.into())),
        "boolean" => match s.trim().to_lowercase().as_str() {
            "true" | "1" | "yes" => Some(Value::Bool(true)),
            "false" | "0" | "no" => Some(Value::Bool(false)),
            _ => None,
        },
        _ => None,
    };
    coerced.unwrap_or_else(|| value.clone())
}

fn type_matches(value: &Value, expected: &str) -> bool {
    match expected {
        "string" => value.is_string(),
        "integer" => value.is_i64() || value.is_u64(),
        "number" => value.is_number(),
        "boolean" => value.is_boolean(),
        "array" => value.is_array(),
        "object" => value.is_object(),
        "null" => value.is_null(),
        _ => true,
    }
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

/// Validate (and coerce) `args` against `schema`.
///
/// Returns the coerced argument object, or a human-readable reason.
pub fn validate_arguments(schema: &Value, args: Value) -> Result<Value, String> {
    let args = match args {
        Value::Object(map) => map,
        Value::Null => Map::new(),
        other => {
            return Err(format!(
                "arguments must be an object, got {}",
                type_name(&other)
            ));
        }
    };

    let empty = Map::new();
    let properties = schema
        .get("properties")
        .and_then(Value::as_object)
        .unwrap_or(&empty);

    if let Some(required) = schema.get("required").and_then(Value::as_array) {
        for field in required.iter().filter_map(Value::as_str) {
            if !args.contains_key(field) {
                return Err(format!("missing required field '{field}'"));
            }
        }
    }

    let closed = schema.get("additionalProperties") == Some(&Value::Bool(false));
    let mut checked = Map::with_capacity(args.len());
    for (key, value) in args {
        let Some(prop) = properties.get(&key) else {
            if closed {
                return Err(format!("unexpected field '{key}'"));
            }
            checked.insert(key, value);
            continue;
        };

        let value = match prop.get("type").and_then(Value::as_str) {
            Some(expected) => {
                let coerced = coerce_value(&value, expected);
                if !type_matches(&coerced, expected) {
                    return Err(format!(
                        "field '{key}' must be {expected}, got {}",
                        type_name(&value)
                    ));
                }
                coerced
            }
            None => value,
        };
        checked.insert(key, value);
    }

    Ok(Value::Object(checked))
}
