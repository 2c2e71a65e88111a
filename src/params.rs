//! Schema-driven tool parameter handling.
//!
//! Tools describe their parameters with a small JSON Schema subset
//! (`type`, `enum`, `minimum`, `maximum`, `default`, `required`). Every
//! surface (HTTP, MCP, CLI) runs [`validate_params`] before a tool sees its
//! input, so tools can read parameters with the typed getters below
//! without re-checking them.

use anyhow::Result;
use serde_json::{Map, Value};

use crate::traits::ToolError;

/// Return early with [`ToolError::InvalidParams`].
macro_rules! reject {
    ($($arg:tt)*) => {
        return Err(ToolError::InvalidParams(format!($($arg)*)).into())
    };
}

/// Validate `params` against `schema` and inject defaults.
///
/// Checks required fields, types, enum membership and numeric bounds.
/// Out-of-range numbers are rejected, never clamped.
pub fn validate_params(schema: &Value, params: &Value) -> Result<Value> {
    let params_obj = match params {
        Value::Object(map) => map.clone(),
        Value::Null => Map::new(),
        other => reject!("parameters must be a JSON object, got {}", json_type_name(other)),
    };

    let properties = schema
        .get("properties")
        .and_then(|p| p.as_object())
        .cloned()
        .unwrap_or_default();

    let required: Vec<String> = schema
        .get("required")
        .and_then(|r| r.as_array())
        .map(|arr| {
            arr.iter()
                .filter_map(|v| v.as_str().map(|s| s.to_string()))
                .collect()
        })
        .unwrap_or_default();

    let mut result = params_obj.clone();

    for req_field in &required {
        match params_obj.get(req_field) {
            None | Some(Value::Null) => reject!("missing required parameter: {}", req_field),
            Some(Value::String(s)) if s.trim().is_empty() => {
                reject!("parameter '{}' must not be empty", req_field)
            }
            _ => {}
        }
    }

    for (prop_name, prop_schema) in &properties {
        let Some(value) = params_obj.get(prop_name).filter(|v| !v.is_null()) else {
            if let Some(default) = prop_schema.get("default") {
                result.insert(prop_name.clone(), default.clone());
            }
            continue;
        };

        if let Some(expected_type) = prop_schema.get("type").and_then(|t| t.as_str()) {
            let type_ok = match expected_type {
                "string" => value.is_string(),
                "integer" => value.is_i64() || value.is_u64(),
                "number" => value.is_number(),
                "boolean" => value.is_boolean(),
                "array" => value.is_array(),
                "object" => value.is_object(),
                _ => true,
            };
            if !type_ok {
                reject!(
                    "parameter '{}' must be of type '{}', got {}",
                    prop_name,
                    expected_type,
                    json_type_name(value)
                );
            }
        }

        if let Some(enum_values) = prop_schema.get("enum").and_then(|e| e.as_array()) {
            if !enum_values.contains(value) {
                let allowed: Vec<String> = enum_values.iter().map(|v| v.to_string()).collect();
                reject!(
                    "parameter '{}' must be one of [{}], got {}",
                    prop_name,
                    allowed.join(", "),
                    value
                );
            }
        }

        if let Some(n) = value.as_f64() {
            if let Some(min) = prop_schema.get("minimum").and_then(|m| m.as_f64()) {
                if n < min {
                    reject!("parameter '{}' must be >= {}, got {}", prop_name, min, value);
                }
            }
            if let Some(max) = prop_schema.get("maximum").and_then(|m| m.as_f64()) {
                if n > max {
                    reject!("parameter '{}' must be <= {}, got {}", prop_name, max, value);
                }
            }
        }
    }

    Ok(Value::Object(result))
}

/// Build a params object from CLI `key=value` pairs, converting each value
/// to the type its schema property declares. Unknown keys and untyped
/// properties fall back to parsing the value as JSON, then as a string.
pub fn params_from_pairs(schema: &Value, pairs: &[(String, String)]) -> Result<Value> {
    let mut params = Map::new();
    for (key, raw) in pairs {
        let expected = schema
            .get("properties")
            .and_then(|p| p.get(key))
            .and_then(|p| p.get("type"))
            .and_then(|t| t.as_str());
        let value = match expected {
            Some("string") => Value::String(raw.clone()),
            Some("integer") => match raw.trim().parse::<i64>() {
                Ok(n) => Value::from(n),
                Err(_) => reject!("parameter '{}' must be an integer, got '{}'", key, raw),
            },
            Some("number") => match raw.trim().parse::<f64>() {
                Ok(n) => Value::from(n),
                Err(_) => reject!("parameter '{}' must be a number, got '{}'", key, raw),
            },
            Some("boolean") => match raw.trim() {
                "true" => Value::Bool(true),
                "false" => Value::Bool(false),
                _ => reject!("parameter '{}' must be true or false, got '{}'", key, raw),
            },
            _ => serde_json::from_str::<Value>(raw).unwrap_or_else(|_| Value::String(raw.clone())),
        };
        params.insert(key.clone(), value);
    }
    Ok(Value::Object(params))
}

/// Non-blank, trimmed string parameter.
pub fn opt_str<'a>(params: &'a Value, name: &str) -> Option<&'a str> {
    params
        .get(name)
        .and_then(|v| v.as_str())
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

/// Required string parameter.
pub fn req_str<'a>(params: &'a Value, name: &str) -> Result<&'a str> {
    match opt_str(params, name) {
        Some(s) => Ok(s),
        None => reject!("parameter '{}' must not be empty", name),
    }
}

pub fn opt_i64(params: &Value, name: &str) -> Option<i64> {
    params.get(name).and_then(|v| v.as_i64())
}

/// Integer parameter with a default, for bounded counts (`limit`, `top_n`).
pub fn usize_or(params: &Value, name: &str, default: usize) -> usize {
    params
        .get(name)
        .and_then(|v| v.as_u64())
        .map(|n| n as usize)
        .unwrap_or(default)
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
