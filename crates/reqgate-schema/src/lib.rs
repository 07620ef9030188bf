//! # reqgate-schema — Default Schema Engine
//!
//! The compiler used when no scope in a route's chain overrides it.
//!
//! ## Pipeline
//!
//! For every request body the compiled validator:
//!
//! 1. **Normalizes** a copy of the body guided by the schema ([`normalize`]):
//!    scalars are coerced to the declared `type` where unambiguous, and keys
//!    outside `properties` are dropped where `additionalProperties: false`.
//! 2. **Checks** the normalized body with a `jsonschema` validator built once
//!    at compile time.
//! 3. **Reports** failures as [`ViolationRecord`](reqgate_core::ViolationRecord)s
//!    (keyword, dotted path, schema path, params, message) in schema order.
//!
//! The string `"42"` against `{"type": "integer"}` is accepted as `42`; the
//! string `"world"` is left untouched and reported as a `type` violation.
//!
//! ## Shared Schemas
//!
//! Schemas registered with [`DefaultEngine::add_schema`] are resolvable by
//! their `$id` from any route schema's `$ref`. Remote references are never
//! fetched.

pub mod engine;
pub mod normalize;
pub mod retriever;
pub mod violation;

pub use engine::{DefaultEngine, EngineOptions, SchemaEngineError};
