//! Behaviour of the default engine as seen through the core compiler
//! capability, the way a route would use it after finalize.

use proptest::prelude::*;
use reqgate_core::{
    validate_request, Method, RouteOptions, RouteRegistry, SchemaCompiler, SchemaDefinition,
    ValidationOutcome, ViolationRecord,
};
use reqgate_schema::{DefaultEngine, EngineOptions};
use serde_json::{json, Value};
use std::sync::Arc;

fn hello_schema() -> Value {
    json!({
        "type": "object",
        "properties": { "hello": { "type": "integer" } }
    })
}

fn validate(schema: Value, body: Value) -> ValidationOutcome {
    DefaultEngine::default()
        .compile(&SchemaDefinition::new(schema))
        .expect("schema compiles")
        .validate(&body)
}

#[test]
fn numeric_string_is_coerced() {
    assert_eq!(
        validate(hello_schema(), json!({"hello": "42"})),
        ValidationOutcome::Accepted(json!({"hello": 42}))
    );
}

#[test]
fn non_numeric_string_is_a_type_violation() {
    let detail = validate(hello_schema(), json!({"hello": "world"}))
        .into_result()
        .unwrap_err();
    assert_eq!(
        detail.violations(),
        &[ViolationRecord {
            keyword: "type".to_string(),
            path: ".hello".to_string(),
            schema_path: "#/properties/hello/type".to_string(),
            params: json!({"type": "integer"}),
            message: "should be integer".to_string(),
        }]
    );
    assert_eq!(
        detail.message(),
        r##"[{"keyword":"type","path":".hello","schemaPath":"#/properties/hello/type","params":{"type":"integer"},"message":"should be integer"}]"##
    );
}

#[test]
fn additional_properties_are_stripped() {
    let schema = json!({
        "type": "object",
        "properties": { "hello": { "type": "integer" } },
        "additionalProperties": false
    });
    assert_eq!(
        validate(schema, json!({"hello": "1", "world": true})),
        ValidationOutcome::Accepted(json!({"hello": 1}))
    );
}

#[test]
fn nested_objects_and_arrays_are_normalized() {
    let schema = json!({
        "type": "object",
        "properties": {
            "user": {
                "type": "object",
                "properties": { "age": { "type": "integer" }, "admin": { "type": "boolean" } },
                "additionalProperties": false
            },
            "scores": { "type": "array", "items": { "type": "number" } }
        }
    });
    let body = json!({
        "user": { "age": "30", "admin": "false", "extra": 1 },
        "scores": ["1.5", 2, "3"]
    });
    assert_eq!(
        validate(schema, body),
        ValidationOutcome::Accepted(json!({
            "user": { "age": 30, "admin": false },
            "scores": [1.5, 2, 3]
        }))
    );
}

#[test]
fn coercion_disabled_rejects_numeric_string() {
    let engine = DefaultEngine::new(EngineOptions {
        coerce_types: false,
        ..EngineOptions::default()
    });
    let outcome = engine
        .compile(&SchemaDefinition::new(hello_schema()))
        .unwrap()
        .validate(&json!({"hello": "42"}));
    assert!(!outcome.is_accepted());
}

#[test]
fn default_engine_behind_registry() {
    let mut registry = RouteRegistry::new(Arc::new(DefaultEngine::default()));
    let root = Arc::clone(registry.root());
    let route = registry
        .register_route(
            &root,
            Method::Post,
            "/",
            RouteOptions::new().with_schema(hello_schema()),
        )
        .unwrap();
    registry.finalize().unwrap();

    assert_eq!(
        validate_request(&route, Some(json!({"hello": "42"}))),
        ValidationOutcome::Accepted(json!({"hello": 42}))
    );
    assert!(!validate_request(&route, None).is_accepted());
}

proptest! {
    #[test]
    fn integers_as_strings_always_coerce(n in any::<i64>()) {
        let outcome = validate(hello_schema(), json!({"hello": n.to_string()}));
        prop_assert_eq!(outcome, ValidationOutcome::Accepted(json!({"hello": n})));
    }

    #[test]
    fn normalization_is_idempotent(n in any::<i32>(), extra in "[a-z]{1,8}") {
        let schema = json!({
            "type": "object",
            "properties": { "hello": { "type": "integer" } },
            "additionalProperties": false
        });
        let compiled = DefaultEngine::default()
            .compile(&SchemaDefinition::new(schema))
            .unwrap();
        let first = compiled
            .validate(&json!({"hello": n.to_string(), "x": extra}))
            .into_result()
            .unwrap();
        let second = compiled.validate(&first).into_result().unwrap();
        prop_assert_eq!(first, second);
    }
}
