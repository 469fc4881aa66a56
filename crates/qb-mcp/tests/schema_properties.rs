//! Generated-schema checks for the input schema sanitizer.

use proptest::prelude::*;
use qb_mcp::schema::{sanitize_schema, ALLOWED_SCHEMA_KEYS};
use serde_json::{Map, Value};

/// Keys seen in framework-generated schemas, plus short property names
fn schema_key() -> impl Strategy<Value = String> {
    prop_oneof![
        prop::sample::select(vec![
            "type",
            "properties",
            "required",
            "description",
            "title",
            "default",
            "anyOf",
            "additionalProperties",
            "$schema",
            "examples",
        ])
        .prop_map(str::to_string),
        "[a-d]{1,2}",
    ]
}

fn json_leaf() -> impl Strategy<Value = Value> {
    prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::from),
        any::<i64>().prop_map(Value::from),
        "[a-d]{0,2}".prop_map(Value::from),
    ]
}

fn schema_value() -> impl Strategy<Value = Value> {
    json_leaf().prop_recursive(5, 96, 6, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..4).prop_map(Value::Array),
            prop::collection::btree_map(schema_key(), inner, 0..6)
                .prop_map(|map| Value::Object(map.into_iter().collect::<Map<_, _>>())),
        ]
    })
}

/// Walks the same positions the sanitizer descends into
fn check_schema(schema: &Value) -> Result<(), TestCaseError> {
    let Value::Object(object) = schema else {
        return Ok(());
    };

    for (key, value) in object {
        prop_assert!(
            ALLOWED_SCHEMA_KEYS.contains(&key.as_str()),
            "unexpected key {} in {}",
            key,
            schema
        );
        match (key.as_str(), value) {
            ("properties", Value::Object(properties)) => {
                for property in properties.values() {
                    check_schema(property)?;
                }
            }
            (_, Value::Object(_)) => check_schema(value)?,
            _ => {}
        }
    }

    if let (Some(Value::Object(properties)), Some(Value::Array(required))) =
        (object.get("properties"), object.get("required"))
    {
        for name in required {
            let listed = name.as_str().is_some_and(|n| properties.contains_key(n));
            prop_assert!(listed, "required {} not in properties of {}", name, schema);
        }
    }

    Ok(())
}

proptest! {
    #[test]
    fn test_sanitize_is_idempotent(schema in schema_value()) {
        let once = sanitize_schema(&schema);
        prop_assert_eq!(sanitize_schema(&once), once);
    }

    #[test]
    fn test_sanitized_schema_keeps_only_allowed_keys(schema in schema_value()) {
        check_schema(&sanitize_schema(&schema))?;
    }

    #[test]
    fn test_non_object_schema_unchanged(leaf in json_leaf()) {
        prop_assert_eq!(sanitize_schema(&leaf), leaf);
    }
}
