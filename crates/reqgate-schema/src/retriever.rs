//! # Shared Schema Resolution
//!
//! Shared schemas are registered by `$id` on the engine and referenced from
//! route schemas with `$ref`. The same lookup serves two callers: the
//! `jsonschema` retriever used while building validators, and the
//! normalizer, which follows `$ref`s to find where to coerce and strip.
//!
//! References never leave the process. An unknown reference fails schema
//! compilation instead of triggering a network fetch.

use std::collections::HashMap;
use std::sync::Arc;

use jsonschema::{Retrieve, Uri};
use serde_json::Value;

/// Shared schemas keyed by `$id`.
pub type SharedSchemas = HashMap<String, Value>;

/// Find a shared schema for `uri`.
///
/// Tries the exact string, then the string without a trailing `#`, then the
/// last path segment. The last form covers relative references such as
/// `"user"`, which the validator sees resolved against its base URI
/// (`json-schema:///user`).
pub fn lookup<'a>(shared: &'a SharedSchemas, uri: &str) -> Option<&'a Value> {
    let trimmed = uri.trim_end_matches('#');
    shared
        .get(uri)
        .or_else(|| shared.get(trimmed))
        .or_else(|| {
            let last = trimmed.rsplit('/').next()?;
            shared.get(last).or_else(|| shared.get(&format!("{last}#")))
        })
}

/// `jsonschema` retriever backed by the engine's shared schemas.
#[derive(Debug, Clone)]
pub struct SharedSchemaRetriever {
    shared: Arc<SharedSchemas>,
}

impl SharedSchemaRetriever {
    /// Create a retriever over `shared`.
    pub fn new(shared: Arc<SharedSchemas>) -> Self {
        Self { shared }
    }
}

impl Retrieve for SharedSchemaRetriever {
    fn retrieve(
        &self,
        uri: &Uri<&str>,
    ) -> Result<Value, Box<dyn std::error::Error + Send + Sync>> {
        let uri_str = uri.as_str();
        lookup(&self.shared, uri_str)
            .cloned()
            .ok_or_else(|| format!("'{uri_str}' does not match any shared schema").into())
    }
}
