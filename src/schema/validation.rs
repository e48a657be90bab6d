use serde_json::Value;

use super::error::SchemaError;
use super::schema::{Schema, SchemaKind};

/// Structural check of a call's arguments against a tool schema.
///
/// Only shape, types, ranges and enums are inspected; payload contents such
/// as base64 image data are left to the executors.
pub fn validate(schema: &Schema, arguments: &Value) -> Result<(), SchemaError> {
    validate_value(schema, arguments, &mut Vec::new())
}

pub fn validate_value(
    schema: &Schema,
    value: &Value,
    path: &mut Vec<String>,
) -> Result<(), SchemaError> {
    match &schema.kind {
        SchemaKind::Boolean => {
            if !value.is_boolean() {
                return Err(mismatch(schema, value, path));
            }
        }
        SchemaKind::Integer => {
            if !(value.is_i64() || value.is_u64()) {
                return Err(mismatch(schema, value, path));
            }
            check_range(schema, value, path)?;
        }
        SchemaKind::Number => {
            if !value.is_number() {
                return Err(mismatch(schema, value, path));
            }
            check_range(schema, value, path)?;
        }
        SchemaKind::String { min_length } => {
            let text = value.as_str().ok_or_else(|| mismatch(schema, value, path))?;
            if let Some(min) = min_length {
                if text.trim().chars().count() < *min {
                    return Err(SchemaError::Validation {
                        message: format!("must contain at least {min} non-blank character(s)"),
                        path: path.clone(),
                    });
                }
            }
        }
        SchemaKind::Array {
            items,
            min_items,
            max_items,
        } => {
            let array = value.as_array().ok_or_else(|| mismatch(schema, value, path))?;
            if let Some(min) = min_items {
                if array.len() < *min {
                    return Err(SchemaError::Validation {
                        message: format!("expected at least {min} item(s), got {}", array.len()),
                        path: path.clone(),
                    });
                }
            }
            if let Some(max) = max_items {
                if array.len() > *max {
                    return Err(SchemaError::Validation {
                        message: format!("expected at most {max} item(s), got {}", array.len()),
                        path: path.clone(),
                    });
                }
            }
            for (idx, element) in array.iter().enumerate() {
                path.push(idx.to_string());
                validate_value(items, element, path)?;
                path.pop();
            }
        }
        SchemaKind::Object {
            properties,
            required,
            additional,
        } => {
            let object = value.as_object().ok_or_else(|| mismatch(schema, value, path))?;

            for key in required {
                if !object.contains_key(key) {
                    let mut required_path = path.clone();
                    required_path.push(key.clone());
                    return Err(SchemaError::Validation {
                        message: format!("missing required property `{}`", key),
                        path: required_path,
                    });
                }
            }

            for (key, val) in object {
                if let Some(sub_schema) = properties.get(key) {
                    path.push(key.clone());
                    validate_value(sub_schema, val, path)?;
                    path.pop();
                } else if !additional {
                    let mut extra_path = path.clone();
                    extra_path.push(key.clone());
                    return Err(SchemaError::Validation {
                        message: format!("unexpected property `{}`", key),
                        path: extra_path,
                    });
                }
            }
        }
    }

    if let Some(allowed) = &schema.enum_values {
        if !allowed.contains(value) {
            return Err(SchemaError::Validation {
                message: format!("{} is not one of {}", value, Value::Array(allowed.clone())),
                path: path.clone(),
            });
        }
    }

    Ok(())
}

fn mismatch(schema: &Schema, value: &Value, path: &[String]) -> SchemaError {
    SchemaError::Validation {
        message: format!("expected {}, got {}", schema.type_name(), json_type(value)),
        path: path.to_vec(),
    }
}

fn check_range(schema: &Schema, value: &Value, path: &[String]) -> Result<(), SchemaError> {
    let Some(number) = value.as_f64() else {
        return Ok(());
    };
    let below = schema.minimum.is_some_and(|min| number < min);
    let above = schema.maximum.is_some_and(|max| number > max);
    if below || above {
        let min = schema.minimum.map_or("-inf".to_string(), |v| v.to_string());
        let max = schema.maximum.map_or("inf".to_string(), |v| v.to_string());
        return Err(SchemaError::Validation {
            message: format!("{number} is outside the allowed range [{min}, {max}]"),
            path: path.to_vec(),
        });
    }
    Ok(())
}

fn json_type(value: &Value) -> &'static str {
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
