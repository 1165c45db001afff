//! Structural schema utilities shared by write validation (spec.md §4.7)
//! and the MQTT adapter's topic-shape type inference (spec.md §4.3).
//!
//! Neither use case needs a full JSON-Schema validator: writes are checked
//! structurally against the *current* head value (not a declared schema),
//! and MQTT types are inferred top-level shapes of the latest payload.

use crate::Value;

/// Why a proposed write was rejected by [`validate_and_coerce`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SchemaMismatch {
    #[error("expected a value compatible with {expected}, got {actual}")]
    PrimitiveMismatch { expected: String, actual: String },
    #[error("object key sets differ: missing {missing:?}, unexpected {unexpected:?}")]
    KeySetMismatch {
        missing: Vec<String>,
        unexpected: Vec<String>,
    },
    #[error("expected an array, got {actual}")]
    NotAnArray { actual: String },
    #[error("at field `{field}`: {source}")]
    Nested {
        field: String,
        source: Box<SchemaMismatch>,
    },
}

fn kind_name(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Attempt to coerce `new_value` into something structurally compatible
/// with `current`, per spec.md §4.7:
///
/// - Primitives: coercion in the set `{string, int, float}` only; any other
///   mismatch (including booleans/null against anything else) fails.
/// - Objects: the sorted key-sets must match exactly at every depth; each
///   value is recursively validated against its counterpart.
/// - Arrays: every element of `new_value` is validated against the *first*
///   element of `current` (the stored array's element template).
///
/// On success, returns the coerced replacement value; on failure, the
/// original storage is left untouched by the caller.
pub fn validate_and_coerce(current: &Value, new_value: &Value) -> Result<Value, SchemaMismatch> {
    match current {
        Value::Object(current_map) => {
            let Value::Object(new_map) = new_value else {
                return Err(SchemaMismatch::PrimitiveMismatch {
                    expected: "object".to_string(),
                    actual: kind_name(new_value).to_string(),
                });
            };

            let mut current_keys: Vec<&String> = current_map.keys().collect();
            let mut new_keys: Vec<&String> = new_map.keys().collect();
            current_keys.sort();
            new_keys.sort();
            if current_keys != new_keys {
                let missing: Vec<String> = current_map
                    .keys()
                    .filter(|k| !new_map.contains_key(*k))
                    .cloned()
                    .collect();
                let unexpected: Vec<String> = new_map
                    .keys()
                    .filter(|k| !current_map.contains_key(*k))
                    .cloned()
                    .collect();
                return Err(SchemaMismatch::KeySetMismatch { missing, unexpected });
            }

            let mut out = serde_json::Map::new();
            for (k, current_v) in current_map {
                let new_v = &new_map[k];
                let coerced = validate_and_coerce(current_v, new_v)
                    .map_err(|e| SchemaMismatch::Nested {
                        field: k.clone(),
                        source: Box::new(e),
                    })?;
                out.insert(k.clone(), coerced);
            }
            Ok(Value::Object(out))
        }
        Value::Array(current_arr) => {
            let Value::Array(new_arr) = new_value else {
                return Err(SchemaMismatch::NotAnArray {
                    actual: kind_name(new_value).to_string(),
                });
            };
            let Some(template) = current_arr.first() else {
                // No template to validate against; accept any array as-is.
                return Ok(new_value.clone());
            };
            let mut out = Vec::with_capacity(new_arr.len());
            for (i, elem) in new_arr.iter().enumerate() {
                let coerced = validate_and_coerce(template, elem).map_err(|e| SchemaMismatch::Nested {
                    field: i.to_string(),
                    source: Box::new(e),
                })?;
                out.push(coerced);
            }
            Ok(Value::Array(out))
        }
        Value::String(_) => coerce_primitive_to_string(new_value),
        Value::Number(current_num) => coerce_primitive_to_number(current_num, new_value),
        Value::Bool(_) => match new_value {
            Value::Bool(_) => Ok(new_value.clone()),
            other => Err(SchemaMismatch::PrimitiveMismatch {
                expected: "boolean".to_string(),
                actual: kind_name(other).to_string(),
            }),
        },
        Value::Null => Ok(new_value.clone()),
    }
}

fn coerce_primitive_to_string(new_value: &Value) -> Result<Value, SchemaMismatch> {
    match new_value {
        Value::String(_) => Ok(new_value.clone()),
        Value::Number(n) => Ok(Value::String(n.to_string())),
        other => Err(SchemaMismatch::PrimitiveMismatch {
            expected: "string".to_string(),
            actual: kind_name(other).to_string(),
        }),
    }
}

fn coerce_primitive_to_number(
    current_num: &serde_json::Number,
    new_value: &Value,
) -> Result<Value, SchemaMismatch> {
    let is_currently_int = current_num.is_i64() || current_num.is_u64();
    match new_value {
        Value::Number(_) => Ok(new_value.clone()),
        Value::String(s) => {
            if is_currently_int {
                s.parse::<i64>()
                    .map(|i| Value::Number(i.into()))
                    .or_else(|_| {
                        s.parse::<f64>().map(|f| f as i64).map(|i| Value::Number(i.into()))
                    })
                    .map_err(|_| SchemaMismatch::PrimitiveMismatch {
                        expected: "int".to_string(),
                        actual: format!("string({s})"),
                    })
            } else {
                s.parse::<f64>()
                    .ok()
                    .and_then(serde_json::Number::from_f64)
                    .map(Value::Number)
                    .ok_or_else(|| SchemaMismatch::PrimitiveMismatch {
                        expected: "float".to_string(),
                        actual: format!("string({s})"),
                    })
            }
        }
        other => Err(SchemaMismatch::PrimitiveMismatch {
            expected: "number".to_string(),
            actual: kind_name(other).to_string(),
        }),
    }
}

/// Infer a minimal JSON-Schema-like description of `value`'s top-level
/// shape, used by the MQTT adapter to synthesize an `ObjectType` per topic
/// from the most recent payload (spec.md §4.3).
pub fn infer_schema(value: &Value) -> Value {
    match value {
        Value::Null => serde_json::json!({"type": "null"}),
        Value::Bool(_) => serde_json::json!({"type": "boolean"}),
        Value::Number(n) => {
            if n.is_i64() || n.is_u64() {
                serde_json::json!({"type": "integer"})
            } else {
                serde_json::json!({"type": "number"})
            }
        }
        Value::String(_) => serde_json::json!({"type": "string"}),
        Value::Array(items) => {
            let item_schema = items.first().map(infer_schema).unwrap_or(serde_json::json!({}));
            serde_json::json!({"type": "array", "items": item_schema})
        }
        Value::Object(map) => {
            let properties: serde_json::Map<String, Value> = map
                .iter()
                .map(|(k, v)| (k.clone(), infer_schema(v)))
                .collect();
            serde_json::json!({"type": "object", "properties": properties})
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn string_to_int_coercion_succeeds() {
        let current = json!(12);
        let incoming = json!("13");
        assert_eq!(validate_and_coerce(&current, &incoming).unwrap(), json!(13));
    }

    #[test]
    fn object_key_mismatch_fails() {
        let current = json!({"a": 1, "b": 2});
        let incoming = json!({"a": 1});
        assert!(validate_and_coerce(&current, &incoming).is_err());
    }

    #[test]
    fn array_validates_against_first_element_template() {
        let current = json!([{"x": 1}]);
        let incoming = json!([{"x": 2}, {"x": 3}]);
        let result = validate_and_coerce(&current, &incoming).unwrap();
        assert_eq!(result, json!([{"x": 2}, {"x": 3}]));
    }

    #[test]
    fn array_element_shape_mismatch_fails() {
        let current = json!([{"x": 1}]);
        let incoming = json!([{"y": 2}]);
        assert!(validate_and_coerce(&current, &incoming).is_err());
    }

    #[test]
    fn infer_schema_handles_nested_objects() {
        let value = json!({"RPM": 1200, "label": "spindle"});
        let schema = infer_schema(&value);
        assert_eq!(schema["type"], "object");
        assert_eq!(schema["properties"]["RPM"]["type"], "integer");
        assert_eq!(schema["properties"]["label"]["type"], "string");
    }
}
