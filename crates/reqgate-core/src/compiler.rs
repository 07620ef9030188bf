//! # Schema Compiler Capability
//!
//! A [`SchemaCompiler`] turns a [`SchemaDefinition`] into a
//! [`CompiledValidator`] once, at finalize. The validator is then shared by
//! every request to the route, so it must be `Send + Sync` and free of
//! unsynchronized mutable state.
//!
//! Any `Fn(&SchemaDefinition) -> Result<CompiledValidator, BoxError>` closure
//! is a compiler; [`compiler_fn`] wraps one into a [`SharedCompiler`].

use std::any::Any;
use std::fmt;
use std::fmt::Display;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use serde_json::Value;

use crate::error::{BoxError, CompileError};
use crate::outcome::{ValidationErrorDetail, ValidationOutcome};
use crate::schema::SchemaDefinition;

type ValidateFn = dyn Fn(&Value) -> ValidationOutcome + Send + Sync;

/// The per-route executable check produced by a [`SchemaCompiler`].
#[derive(Clone)]
pub struct CompiledValidator {
    inner: Arc<ValidateFn>,
}

impl CompiledValidator {
    /// Build a validator from a function returning a [`ValidationOutcome`].
    pub fn from_fn<F>(f: F) -> Self
    where
        F: Fn(&Value) -> ValidationOutcome + Send + Sync + 'static,
    {
        Self { inner: Arc::new(f) }
    }

    /// Build a validator from a function returning `Result`.
    ///
    /// The error's `Display` text becomes the rejection message.
    pub fn from_result_fn<F, E>(f: F) -> Self
    where
        F: Fn(&Value) -> Result<Value, E> + Send + Sync + 'static,
        E: Display,
    {
        Self::from_fn(move |body| match f(body) {
            Ok(accepted) => ValidationOutcome::Accepted(accepted),
            Err(err) => ValidationOutcome::Rejected(ValidationErrorDetail::Message(err.to_string())),
        })
    }

    /// A validator that accepts every body unchanged.
    pub fn accept_all() -> Self {
        Self::from_fn(|body| ValidationOutcome::Accepted(body.clone()))
    }

    /// Run the validator. May panic if the underlying engine does; use
    /// [`crate::invoke`] on the request path.
    pub fn validate(&self, body: &Value) -> ValidationOutcome {
        (self.inner)(body)
    }
}

impl fmt::Debug for CompiledValidator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompiledValidator").finish_non_exhaustive()
    }
}

/// Pluggable schema engine.
pub trait SchemaCompiler: Send + Sync {
    /// Compile `schema` into a reusable validator.
    fn compile(&self, schema: &SchemaDefinition) -> Result<CompiledValidator, CompileError>;
}

impl<F> SchemaCompiler for F
where
    F: Fn(&SchemaDefinition) -> Result<CompiledValidator, BoxError> + Send + Sync,
{
    fn compile(&self, schema: &SchemaDefinition) -> Result<CompiledValidator, CompileError> {
        self(schema).map_err(CompileError::from)
    }
}

/// A compiler shared between scopes and routes.
pub type SharedCompiler = Arc<dyn SchemaCompiler>;

/// Wrap a closure as a [`SharedCompiler`].
pub fn compiler_fn<F>(f: F) -> SharedCompiler
where
    F: Fn(&SchemaDefinition) -> Result<CompiledValidator, BoxError> + Send + Sync + 'static,
{
    Arc::new(f)
}

/// Compile, turning a panic inside the compiler into [`CompileError::Panicked`].
pub(crate) fn compile_guarded(
    compiler: &dyn SchemaCompiler,
    schema: &SchemaDefinition,
) -> Result<CompiledValidator, CompileError> {
    panic::catch_unwind(AssertUnwindSafe(|| compiler.compile(schema)))
        .unwrap_or_else(|payload| Err(CompileError::Panicked(panic_message(payload.as_ref()))))
}

/// Best-effort text of a panic payload.
pub fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "validator panicked with a non-string payload".to_string()
    }
}
