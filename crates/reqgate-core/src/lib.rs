#![deny(missing_docs)]

//! # reqgate-core — Request Validation Core
//!
//! Everything between "a route declared a body schema" and "the handler may
//! run" lives here. The HTTP listener, router and JSON parser are someone
//! else's problem; this crate receives a parsed body and answers with
//! [`ValidationOutcome::Accepted`] or [`ValidationOutcome::Rejected`].
//!
//! ## Phases
//!
//! 1. **Registration.** A tree of [`ScopeNode`]s mirrors nested plugin
//!    registration. Each node may carry one [`SchemaCompiler`] override.
//!    Routes are added to the [`RouteRegistry`] under a scope.
//! 2. **Finalize.** [`RouteRegistry::finalize`] resolves the compiler for
//!    every route (route override, else nearest ancestor, else the root
//!    default) and compiles its schema exactly once. Any failure aborts
//!    startup with a [`ConfigurationError`].
//! 3. **Request.** [`validate_request`] runs the precompiled
//!    [`CompiledValidator`]. Panicking validators are caught and reported as
//!    rejections; nothing in the request path can take the process down.
//!
//! ## Crate Policy
//!
//! - No internal crate dependencies. Engines live in other crates and plug
//!   in through [`SchemaCompiler`].
//! - No `.unwrap()` outside tests.

pub mod compiler;
pub mod error;
pub mod invoke;
pub mod method;
pub mod outcome;
pub mod path;
pub mod registry;
pub mod schema;
pub mod scope;

pub use compiler::{compiler_fn, panic_message, CompiledValidator, SchemaCompiler, SharedCompiler};
pub use error::{BoxError, CompileError, ConfigurationError};
pub use invoke::{invoke, validate_request};
pub use method::Method;
pub use outcome::{ValidationErrorDetail, ValidationOutcome, ViolationRecord};
pub use registry::{RouteEntry, RouteOptions, RouteRegistry};
pub use schema::SchemaDefinition;
pub use scope::ScopeNode;
