//! # Body Normalization
//!
//! Rewrites a body so that it has the best chance of matching its schema,
//! before any keyword is checked:
//!
//! - **Coercion**: a scalar whose JSON type is not among the declared
//!   `type`s is converted to the first declared type it converts to
//!   unambiguously. Values that do not convert are left alone and fail the
//!   `type` check later.
//! - **Removal**: on objects whose schema says `additionalProperties: false`,
//!   keys not listed in `properties` are dropped. Schemas with
//!   `patternProperties` are left untouched.
//!
//! The walk follows `properties`, object-valued `additionalProperties`,
//! `items` (single schema or tuple) and `$ref`. It descends one body level
//! per step, so recursive schemas terminate with the body.
//!
//! ## Coercion table
//!
//! | to \ from | string | number | boolean | null |
//! |---|---|---|---|---|
//! | `string`  | - | decimal text | `"true"`/`"false"` | `""` |
//! | `number`  | parsed if finite | - | `1`/`0` | `0` |
//! | `integer` | parsed if integral | integral floats | `1`/`0` | `0` |
//! | `boolean` | `"true"`/`"false"` only | `1`/`0` only | - | `false` |
//! | `null`    | `""` only | `0` only | `false` only | - |
//!
//! Integer text is read as `i64`, then `u64`. Anything longer goes through
//! `f64` like every JavaScript number: `"99999999999999999999"` becomes
//! `1e20`, which is integral and therefore accepted, with the precision an
//! `f64` has. Integral floats outside the `i64` range stay floats.

use serde_json::{Map, Number, Value};

use crate::engine::EngineOptions;
use crate::retriever::{lookup, SharedSchemas};

/// Upper bound on chained `$ref` hops from a single schema node.
const MAX_REF_HOPS: usize = 32;

/// Schema-guided body rewriter for one compiled schema.
pub struct Normalizer<'a> {
    root: &'a Value,
    shared: &'a SharedSchemas,
    options: EngineOptions,
}

impl<'a> Normalizer<'a> {
    /// Create a normalizer for `root`, resolving `$ref`s against `shared`.
    pub fn new(root: &'a Value, shared: &'a SharedSchemas, options: EngineOptions) -> Self {
        Self {
            root,
            shared,
            options,
        }
    }

    /// Normalize `value` in place.
    pub fn normalize(&self, value: &mut Value) {
        self.walk(self.root, value);
    }

    fn walk(&self, schema: &'a Value, value: &mut Value) {
        let Some(schema) = self.deref(schema).and_then(Value::as_object) else {
            return;
        };
        if self.options.coerce_types {
            if let Some(types) = declared_types(schema) {
                coerce(value, &types);
            }
        }
        match value {
            Value::Object(map) => self.walk_object(schema, map),
            Value::Array(items) => self.walk_array(schema, items),
            _ => {}
        }
    }

    fn walk_object(&self, schema: &'a Map<String, Value>, map: &mut Map<String, Value>) {
        let properties = schema.get("properties").and_then(Value::as_object);
        let additional = schema.get("additionalProperties");

        if self.options.remove_additional
            && matches!(additional, Some(Value::Bool(false)))
            && !schema.contains_key("patternProperties")
        {
            map.retain(|key, _| properties.is_some_and(|p| p.contains_key(key)));
        }

        for (key, child) in map.iter_mut() {
            match properties.and_then(|p| p.get(key)) {
                Some(sub) => self.walk(sub, child),
                None => {
                    if let Some(extra @ Value::Object(_)) = additional {
                        self.walk(extra, child);
                    }
                }
            }
        }
    }

    fn walk_array(&self, schema: &'a Map<String, Value>, items: &mut [Value]) {
        match schema.get("items") {
            Some(Value::Array(tuple)) => {
                for (item, sub) in items.iter_mut().zip(tuple) {
                    self.walk(sub, item);
                }
            }
            Some(sub) => {
                for item in items.iter_mut() {
                    self.walk(sub, item);
                }
            }
            None => {}
        }
    }

    /// Follow `$ref` until a schema without one is reached.
    fn deref(&self, mut schema: &'a Value) -> Option<&'a Value> {
        for _ in 0..MAX_REF_HOPS {
            let Some(reference) = schema.get("$ref").and_then(Value::as_str) else {
                return Some(schema);
            };
            schema = self.resolve(reference)?;
        }
        tracing::warn!("$ref chain too long; skipping normalization of this subschema");
        None
    }

    fn resolve(&self, reference: &str) -> Option<&'a Value> {
        let (id, fragment) = reference.split_once('#').unwrap_or((reference, ""));
        let base = if id.is_empty() {
            self.root
        } else {
            lookup(self.shared, id)?
        };
        if fragment.is_empty() {
            Some(base)
        } else {
            base.pointer(fragment)
        }
    }
}

/// The `type` keyword as a list of names.
fn declared_types(schema: &Map<String, Value>) -> Option<Vec<&str>> {
    match schema.get("type")? {
        Value::String(single) => Some(vec![single.as_str()]),
        Value::Array(many) => Some(many.iter().filter_map(Value::as_str).collect()),
        _ => None,
    }
}

/// Coerce `value` to the first of `types` it converts to, unless it already
/// matches one of them.
pub fn coerce(value: &mut Value, types: &[&str]) {
    if types.iter().any(|ty| is_type(value, ty)) {
        return;
    }
    if let Some(coerced) = types.iter().find_map(|ty| coerce_to(value, ty)) {
        *value = coerced;
    }
}

/// Whether `value` is an instance of the JSON Schema primitive type `ty`.
pub fn is_type(value: &Value, ty: &str) -> bool {
    match ty {
        "null" => value.is_null(),
        "boolean" => value.is_boolean(),
        "object" => value.is_object(),
        "array" => value.is_array(),
        "string" => value.is_string(),
        "number" => value.is_number(),
        "integer" => is_integer(value),
        _ => false,
    }
}

fn is_integer(value: &Value) -> bool {
    value.is_i64()
        || value.is_u64()
        || value.as_f64().is_some_and(|f| f.is_finite() && f.fract() == 0.0)
}

fn coerce_to(value: &Value, ty: &str) -> Option<Value> {
    match (ty, value) {
        ("string", Value::Number(n)) => Some(Value::String(n.to_string())),
        ("string", Value::Bool(b)) => Some(Value::String(b.to_string())),
        ("string", Value::Null) => Some(Value::String(String::new())),

        ("number", Value::String(s)) => parse_number(s),
        ("integer", Value::String(s)) => parse_integer(s),
        ("integer", Value::Number(n)) => n.as_f64().and_then(integral),
        ("number" | "integer", Value::Bool(b)) => Some(Value::from(i64::from(*b))),
        ("number" | "integer", Value::Null) => Some(Value::from(0)),

        ("boolean", Value::String(s)) => match s.as_str() {
            "true" => Some(Value::Bool(true)),
            "false" => Some(Value::Bool(false)),
            _ => None,
        },
        ("boolean", Value::Number(n)) => match n.as_i64() {
            Some(0) => Some(Value::Bool(false)),
            Some(1) => Some(Value::Bool(true)),
            _ => None,
        },
        ("boolean", Value::Null) => Some(Value::Bool(false)),

        ("null", Value::String(s)) if s.is_empty() => Some(Value::Null),
        ("null", Value::Number(n)) if n.as_f64() == Some(0.0) => Some(Value::Null),
        ("null", Value::Bool(false)) => Some(Value::Null),

        _ => None,
    }
}

fn parse_number(s: &str) -> Option<Value> {
    if let Ok(i) = s.parse::<i64>() {
        return Some(Value::from(i));
    }
    let f = s.parse::<f64>().ok().filter(|f| f.is_finite())?;
    Number::from_f64(f).map(Value::Number)
}

/// Exact for `i64`/`u64` text, `f64` precision beyond that.
fn parse_integer(s: &str) -> Option<Value> {
    if let Ok(i) = s.parse::<i64>() {
        return Some(Value::from(i));
    }
    if let Ok(u) = s.parse::<u64>() {
        return Some(Value::from(u));
    }
    s.parse::<f64>().ok().and_then(integral)
}

/// An integral, finite float as a JSON integer.
fn integral(f: f64) -> Option<Value> {
    if !f.is_finite() || f.fract() != 0.0 {
        return None;
    }
    if f >= i64::MIN as f64 && f < i64::MAX as f64 {
        Some(Value::from(f as i64))
    } else {
        Number::from_f64(f).map(Value::Number)
    }
}
