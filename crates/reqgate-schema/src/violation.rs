//! # Violation Records
//!
//! Maps `jsonschema` errors onto [`ViolationRecord`]s:
//!
//! - `keyword` from the error kind, else the last keyword in the schema path.
//! - `path` in dotted form (`.hello`, `.items[0]`, `['a b']`), empty at the root.
//! - `schemaPath` as `#` plus the JSON pointer up to the failing keyword.
//! - `params` and `message` per keyword; unrecognized keywords fall back to
//!   the keyword's schema value and the `jsonschema` error text.
//!
//! ## Ordering
//!
//! `jsonschema` checks keywords in the order they sit in the schema map,
//! which is alphabetical. Records are re-sorted by [`sort_by_traversal`] so
//! that, at every schema level, `type` comes first, then the per-type rules
//! (number, string, array, object), then the combinators:
//!
//! ```text
//! type
//! maximum exclusiveMaximum minimum exclusiveMinimum multipleOf
//! maxLength minLength pattern format
//! maxItems minItems items additionalItems contains uniqueItems
//! maxProperties minProperties required dependencies propertyNames
//! properties patternProperties additionalProperties
//! $ref const enum not anyOf oneOf allOf if then else
//! ```
//!
//! A missing required key is therefore reported before a type error in one of
//! the present properties. Siblings under `properties` keep name order.

use jsonschema::error::ValidationErrorKind;
use jsonschema::ValidationError;
use reqgate_core::ViolationRecord;
use serde_json::{json, Map, Value};

/// Keyword evaluation order within one schema object.
const KEYWORD_ORDER: &[&str] = &[
    "type",
    "maximum",
    "exclusiveMaximum",
    "minimum",
    "exclusiveMinimum",
    "multipleOf",
    "maxLength",
    "minLength",
    "pattern",
    "format",
    "maxItems",
    "minItems",
    "items",
    "additionalItems",
    "contains",
    "uniqueItems",
    "maxProperties",
    "minProperties",
    "required",
    "dependencies",
    "propertyNames",
    "properties",
    "patternProperties",
    "additionalProperties",
    "$ref",
    "const",
    "enum",
    "not",
    "anyOf",
    "oneOf",
    "allOf",
    "if",
    "then",
    "else",
];

/// Keywords whose next pointer segment is a name, not a keyword.
const NAMED_CHILDREN: &[&str] = &[
    "properties",
    "patternProperties",
    "definitions",
    "dependencies",
];

/// Build the record for `error`, raised by `instance` against `schema`.
pub fn record(error: &ValidationError<'_>, schema: &Value, instance: &Value) -> ViolationRecord {
    let schema_pointer = error.schema_path.to_string();
    let keyword = keyword_of(&error.kind, &schema_pointer);
    let schema_pointer = truncate_at(&schema_pointer, &keyword);
    let (params, message) = describe(error, &keyword, schema.pointer(&schema_pointer));

    ViolationRecord {
        path: dotted_path(&error.instance_path.to_string(), instance),
        schema_path: format!("#{schema_pointer}"),
        keyword,
        params,
        message,
    }
}

fn keyword_of(kind: &ValidationErrorKind, schema_pointer: &str) -> String {
    match kind {
        ValidationErrorKind::Type { .. } => "type".to_string(),
        ValidationErrorKind::Required { .. } => "required".to_string(),
        ValidationErrorKind::AdditionalProperties { .. } => "additionalProperties".to_string(),
        _ => segments(schema_pointer)
            .filter(|s| s.parse::<usize>().is_err())
            .last()
            .unwrap_or_else(|| "schema".to_string()),
    }
}

fn describe(error: &ValidationError<'_>, keyword: &str, at: Option<&Value>) -> (Value, String) {
    match &error.kind {
        ValidationErrorKind::Required { property } => {
            let name = property
                .as_str()
                .map(str::to_owned)
                .unwrap_or_else(|| property.to_string());
            let message = format!("should have required property '{name}'");
            (json!({ "missingProperty": name }), message)
        }
        ValidationErrorKind::AdditionalProperties { unexpected } => {
            let first = unexpected.first().cloned().unwrap_or_default();
            (
                json!({ "additionalProperty": first }),
                "should NOT have additional properties".to_string(),
            )
        }
        ValidationErrorKind::Type { .. } => {
            let expected = type_names(at);
            let message = format!("should be {expected}");
            (json!({ "type": expected }), message)
        }
        _ => {
            let mut params = Map::new();
            if let Some(value) = at {
                params.insert(keyword.to_string(), value.clone());
            }
            (Value::Object(params), error.to_string())
        }
    }
}

/// Comma-joined declared types, as found at the failing `type` keyword.
fn type_names(at: Option<&Value>) -> String {
    match at {
        Some(Value::String(single)) => single.clone(),
        Some(Value::Array(many)) => many
            .iter()
            .filter_map(Value::as_str)
            .collect::<Vec<_>>()
            .join(","),
        _ => "of the declared type".to_string(),
    }
}

/// One step of a schema path, ordered the way the schema is walked.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
enum Step {
    Keyword(usize),
    Name(String),
    Index(usize),
}

fn traversal_key(schema_path: &str) -> Vec<Step> {
    let pointer = schema_path.strip_prefix('#').unwrap_or(schema_path);
    let mut key = Vec::new();
    let mut named = false;
    for segment in segments(pointer) {
        let step = if named {
            Step::Name(segment.clone())
        } else if let Ok(index) = segment.parse::<usize>() {
            Step::Index(index)
        } else {
            let rank = KEYWORD_ORDER
                .iter()
                .position(|k| *k == segment)
                .unwrap_or(KEYWORD_ORDER.len());
            Step::Keyword(rank)
        };
        named = !named && NAMED_CHILDREN.contains(&segment.as_str());
        key.push(step);
    }
    key
}

/// Stable-sort `records` into schema traversal order.
pub fn sort_by_traversal(records: &mut [ViolationRecord]) {
    records.sort_by_cached_key(|record| traversal_key(&record.schema_path));
}

/// Unescaped pointer segments.
fn segments(pointer: &str) -> impl Iterator<Item = String> + '_ {
    pointer
        .split('/')
        .skip(1)
        .map(|s| s.replace("~1", "/").replace("~0", "~"))
}

/// Cut `pointer` just after the last segment equal to `keyword`.
fn truncate_at(pointer: &str, keyword: &str) -> String {
    let raw: Vec<&str> = pointer.split('/').collect();
    match raw.iter().rposition(|s| *s == keyword) {
        Some(i) if i > 0 => raw[..=i].join("/"),
        _ => pointer.to_string(),
    }
}

/// Convert a JSON pointer into the dotted form, using `instance` to tell
/// array indices from numeric object keys.
pub fn dotted_path(pointer: &str, instance: &Value) -> String {
    let mut out = String::new();
    let mut current = Some(instance);
    for segment in segments(pointer) {
        match current {
            Some(Value::Array(items)) => {
                out.push_str(&format!("[{segment}]"));
                current = segment.parse::<usize>().ok().and_then(|i| items.get(i));
            }
            other => {
                if is_identifier(&segment) {
                    out.push('.');
                    out.push_str(&segment);
                } else {
                    out.push_str(&format!("['{}']", segment.replace('\'', "\\'")));
                }
                current = other.and_then(|v| v.get(segment.as_str()));
            }
        }
    }
    out
}

fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_' || c == '$')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$')
}
