//! # Default Engine
//!
//! [`DefaultEngine`] implements [`SchemaCompiler`]. Compilation builds a
//! Draft 7 `jsonschema` validator once; a schema the crate refuses to build
//! (unknown type name, malformed keyword, dangling `$ref`) is a
//! [`CompileError`] and therefore aborts finalize.
//!
//! ## Thread Safety
//!
//! [`CompiledSchema`] holds no mutable state. Every call clones the body,
//! normalizes the clone and checks it, so concurrent requests against the
//! same route never observe each other.

use std::collections::HashMap;
use std::sync::Arc;

use jsonschema::{Draft, Validator};
use reqgate_core::{
    CompileError, CompiledValidator, SchemaCompiler, SchemaDefinition, ValidationErrorDetail,
    ValidationOutcome, ViolationRecord,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::normalize::Normalizer;
use crate::retriever::{SharedSchemaRetriever, SharedSchemas};
use crate::violation;

/// Behaviour switches of the default engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineOptions {
    /// Convert scalars to the declared `type` when unambiguous.
    pub coerce_types: bool,
    /// Drop keys outside `properties` where `additionalProperties: false`.
    pub remove_additional: bool,
    /// Report every violation instead of only the first.
    pub all_errors: bool,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            coerce_types: true,
            remove_additional: true,
            all_errors: false,
        }
    }
}

/// Error registering a shared schema.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SchemaEngineError {
    /// Shared schemas are addressed by `$id`, so one is required.
    #[error("shared schema has no \"$id\"")]
    MissingId,

    /// Another shared schema already uses this `$id`.
    #[error("shared schema '{0}' is already registered")]
    DuplicateId(String),
}

/// The built-in, type-coercing, property-stripping schema compiler.
#[derive(Debug, Clone, Default)]
pub struct DefaultEngine {
    options: EngineOptions,
    shared: Arc<SharedSchemas>,
}

impl DefaultEngine {
    /// Create an engine with `options` and no shared schemas.
    pub fn new(options: EngineOptions) -> Self {
        Self {
            options,
            shared: Arc::new(HashMap::new()),
        }
    }

    /// The engine's options.
    pub fn options(&self) -> EngineOptions {
        self.options
    }

    /// Register a schema that route schemas can `$ref` by its `$id`.
    ///
    /// Validators compiled before this call do not see the new schema.
    ///
    /// # Errors
    ///
    /// [`SchemaEngineError::MissingId`] or [`SchemaEngineError::DuplicateId`].
    pub fn add_schema(&mut self, schema: Value) -> Result<&mut Self, SchemaEngineError> {
        let id = schema
            .get("$id")
            .and_then(Value::as_str)
            .ok_or(SchemaEngineError::MissingId)?
            .trim_end_matches('#')
            .to_string();
        let shared = Arc::make_mut(&mut self.shared);
        if shared.contains_key(&id) {
            return Err(SchemaEngineError::DuplicateId(id));
        }
        tracing::debug!(schema_id = %id, "registered shared schema");
        shared.insert(id, schema);
        Ok(self)
    }

    /// `$id`s of the shared schemas, sorted.
    pub fn shared_schema_ids(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self.shared.keys().map(String::as_str).collect();
        ids.sort_unstable();
        ids
    }

    /// Compile a raw JSON schema.
    ///
    /// # Errors
    ///
    /// [`CompileError::Invalid`] if `jsonschema` cannot build a validator.
    pub fn compile_schema(&self, schema: &Value) -> Result<CompiledSchema, CompileError> {
        let mut options = jsonschema::options();
        options.with_draft(Draft::Draft7);
        options.with_retriever(SharedSchemaRetriever::new(Arc::clone(&self.shared)));
        let validator = options
            .build(schema)
            .map_err(|e| CompileError::Invalid(e.to_string()))?;

        Ok(CompiledSchema {
            schema: schema.clone(),
            shared: Arc::clone(&self.shared),
            validator,
            options: self.options,
        })
    }
}

impl SchemaCompiler for DefaultEngine {
    fn compile(&self, schema: &SchemaDefinition) -> Result<CompiledValidator, CompileError> {
        let compiled = self.compile_schema(schema.as_value())?;
        Ok(CompiledValidator::from_fn(move |body| compiled.validate(body)))
    }
}

/// A schema compiled by [`DefaultEngine`].
pub struct CompiledSchema {
    schema: Value,
    shared: Arc<SharedSchemas>,
    validator: Validator,
    options: EngineOptions,
}

impl CompiledSchema {
    /// Normalize and check `body`.
    pub fn validate(&self, body: &Value) -> ValidationOutcome {
        let mut normalized = body.clone();
        Normalizer::new(&self.schema, &self.shared, self.options).normalize(&mut normalized);

        let mut records: Vec<ViolationRecord> = self
            .validator
            .iter_errors(&normalized)
            .map(|error| violation::record(&error, &self.schema, &normalized))
            .collect();
        violation::sort_by_traversal(&mut records);
        if !self.options.all_errors {
            records.truncate(1);
        }

        if records.is_empty() {
            ValidationOutcome::Accepted(normalized)
        } else {
            ValidationOutcome::Rejected(ValidationErrorDetail::Violations(records))
        }
    }

    /// The schema this was compiled from.
    pub fn schema(&self) -> &Value {
        &self.schema
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn hello_schema() -> Value {
        json!({
            "type": "object",
            "properties": { "hello": { "type": "integer" } }
        })
    }

    fn compile(engine: &DefaultEngine, schema: Value) -> CompiledValidator {
        engine.compile(&SchemaDefinition::new(schema)).unwrap()
    }

    #[test]
    fn accepts_conformant_body_unchanged() {
        let v = compile(&DefaultEngine::default(), hello_schema());
        assert_eq!(
            v.validate(&json!({"hello": 42})),
            ValidationOutcome::Accepted(json!({"hello": 42}))
        );
    }

    #[test]
    fn first_violation_only_by_default() {
        let schema = json!({
            "type": "object",
            "required": ["a", "b"],
            "properties": { "a": { "type": "string" }, "b": { "type": "string" } }
        });
        let v = compile(&DefaultEngine::default(), schema.clone());
        let detail = v.validate(&json!({"a": [], "b": {}})).into_result().unwrap_err();
        assert_eq!(detail.violations().len(), 1);

        let all = DefaultEngine::new(EngineOptions {
            all_errors: true,
            ..EngineOptions::default()
        });
        let v = compile(&all, schema);
        let detail = v.validate(&json!({"a": [], "b": {}})).into_result().unwrap_err();
        assert_eq!(detail.violations().len(), 2);
    }

    #[test]
    fn missing_required_is_reported_before_property_type() {
        let schema = json!({
            "type": "object",
            "required": ["name"],
            "properties": { "hello": { "type": "integer" } }
        });
        let body = json!({"hello": "world"});

        let v = compile(&DefaultEngine::default(), schema.clone());
        let detail = v.validate(&body).into_result().unwrap_err();
        let first = &detail.violations()[0];
        assert_eq!(detail.violations().len(), 1);
        assert_eq!(first.keyword, "required");
        assert_eq!(first.path, "");
        assert_eq!(first.schema_path, "#/required");

        let all = DefaultEngine::new(EngineOptions {
            all_errors: true,
            ..EngineOptions::default()
        });
        let v = compile(&all, schema);
        let detail = v.validate(&body).into_result().unwrap_err();
        let order: Vec<(&str, &str)> = detail
            .violations()
            .iter()
            .map(|r| (r.keyword.as_str(), r.path.as_str()))
            .collect();
        assert_eq!(order, vec![("required", ""), ("type", ".hello")]);
    }

    #[test]
    fn closed_schema_without_removal_rejects_extra_keys() {
        let engine = DefaultEngine::new(EngineOptions {
            remove_additional: false,
            ..EngineOptions::default()
        });
        let v = compile(
            &engine,
            json!({"type": "object", "properties": {}, "additionalProperties": false}),
        );
        let detail = v.validate(&json!({"extra": 1})).into_result().unwrap_err();
        let record = &detail.violations()[0];
        assert_eq!(record.keyword, "additionalProperties");
        assert_eq!(record.params, json!({"additionalProperty": "extra"}));
        assert_eq!(record.message, "should NOT have additional properties");
    }

    #[test]
    fn invalid_schema_fails_to_compile() {
        let err = DefaultEngine::default()
            .compile(&SchemaDefinition::new(json!({"type": "integr"})))
            .unwrap_err();
        assert!(matches!(err, CompileError::Invalid(_)));
    }

    #[test]
    fn unknown_reference_fails_to_compile() {
        let err = DefaultEngine::default()
            .compile(&SchemaDefinition::new(json!({"$ref": "missing#"})))
            .unwrap_err();
        assert!(matches!(err, CompileError::Invalid(_)));
    }

    #[test]
    fn shared_schemas_resolve_by_id() {
        let mut engine = DefaultEngine::default();
        engine
            .add_schema(json!({
                "$id": "greeting",
                "type": "object",
                "properties": { "hello": { "type": "integer" } },
                "required": ["hello"]
            }))
            .unwrap();
        assert_eq!(engine.shared_schema_ids(), vec!["greeting"]);

        let v = compile(&engine, json!({"$ref": "greeting#"}));
        assert_eq!(
            v.validate(&json!({"hello": "7"})),
            ValidationOutcome::Accepted(json!({"hello": 7}))
        );
        assert!(!v.validate(&json!({})).is_accepted());
    }

    #[test]
    fn shared_schema_registration_errors() {
        let mut engine = DefaultEngine::default();
        assert_eq!(
            engine.add_schema(json!({"type": "object"})).unwrap_err(),
            SchemaEngineError::MissingId
        );
        engine.add_schema(json!({"$id": "a"})).unwrap();
        assert_eq!(
            engine.add_schema(json!({"$id": "a#"})).unwrap_err(),
            SchemaEngineError::DuplicateId("a".to_string())
        );
    }

    #[test]
    fn null_body_against_object_schema_is_rejected() {
        let v = compile(&DefaultEngine::default(), hello_schema());
        let detail = v.validate(&Value::Null).into_result().unwrap_err();
        assert_eq!(detail.violations()[0].keyword, "type");
        assert_eq!(detail.violations()[0].path, "");
    }
}
