//! Declared body schemas.

use std::sync::Arc;

use serde_json::Value;

/// An immutable, cheaply cloneable body schema.
///
/// The JSON form is what the default engine compiles. Custom compilers are
/// free to ignore it and close over a richer, engine-specific schema instead.
#[derive(Debug, Clone, PartialEq)]
pub struct SchemaDefinition(Arc<Value>);

impl SchemaDefinition {
    /// Wrap a JSON schema value.
    pub fn new(value: Value) -> Self {
        Self(Arc::new(value))
    }

    /// The JSON form of the schema.
    pub fn as_value(&self) -> &Value {
        &self.0
    }

    /// The `$id` of the schema, if it declares one.
    pub fn id(&self) -> Option<&str> {
        self.0.get("$id").and_then(Value::as_str)
    }
}

impl From<Value> for SchemaDefinition {
    fn from(value: Value) -> Self {
        Self::new(value)
    }
}
