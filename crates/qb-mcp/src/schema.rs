//! Tool schema sanitizer
//!
//! Function-calling providers accept only a subset of JSON Schema. Tool
//! peers publish whatever their framework generates (`title`, `default`,
//! `additionalProperties`, `anyOf`, ...), so every declared input schema is
//! reduced to the keys below before it is offered to the model.

use serde_json::{Map, Value};

/// Schema keys that survive sanitization
pub const ALLOWED_SCHEMA_KEYS: &[&str] = &["type", "properties", "required", "description"];

/// Reduce a JSON-schema fragment to the provider-accepted subset.
///
/// Non-object input is returned unchanged. Names listed in `required` that
/// are not keys of the surviving `properties` are dropped.
pub fn sanitize_schema(schema: &Value) -> Value {
    let Value::Object(object) = schema else {
        return schema.clone();
    };

    let mut cleaned = Map::new();
    for (key, value) in object {
        if !ALLOWED_SCHEMA_KEYS.contains(&key.as_str()) {
            continue;
        }

        let value = match (key.as_str(), value) {
            ("properties", Value::Object(properties)) => Value::Object(
                properties
                    .iter()
                    .map(|(name, property)| (name.clone(), sanitize_schema(property)))
                    .collect(),
            ),
            (_, Value::Object(_)) => sanitize_schema(value),
            _ => value.clone(),
        };
        cleaned.insert(key.clone(), value);
    }

    repair_required(&mut cleaned);
    Value::Object(cleaned)
}

fn repair_required(schema: &mut Map<String, Value>) {
    let Some(Value::Object(properties)) = schema.get("properties") else {
        return;
    };

    let kept: Vec<Value> = match schema.get("required") {
        Some(Value::Array(required)) => required
            .iter()
            .filter(|name| name.as_str().is_some_and(|n| properties.contains_key(n)))
            .cloned()
            .collect(),
        _ => return,
    };

    schema.insert("required".to_string(), Value::Array(kept));
}
