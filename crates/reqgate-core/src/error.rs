//! # Error Hierarchy
//!
//! Startup-time failures. Per-request validation failures are not errors in
//! this sense: they are [`ValidationOutcome::Rejected`](crate::ValidationOutcome)
//! values and never propagate as faults.

use thiserror::Error;

use crate::method::Method;

/// Boxed error returned by closure-based schema compilers.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// A schema compiler could not turn a schema into a validator.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CompileError {
    /// The compiler rejected the schema.
    #[error("invalid schema: {0}")]
    Invalid(String),

    /// The compiler panicked while compiling.
    #[error("schema compiler panicked: {0}")]
    Panicked(String),
}

impl From<BoxError> for CompileError {
    fn from(err: BoxError) -> Self {
        Self::Invalid(err.to_string())
    }
}

/// Fatal registration or finalize failure. Aborts startup.
#[derive(Error, Debug)]
pub enum ConfigurationError {
    /// `set_schema_compiler` was called twice on the same scope.
    #[error("scope '{scope}' already has a schema compiler")]
    DuplicateCompiler {
        /// Path of the offending scope.
        scope: String,
    },

    /// The same method and path were registered twice.
    #[error("route {method} {path} is already registered")]
    DuplicateRoute {
        /// HTTP method of the duplicate route.
        method: Method,
        /// Path of the duplicate route.
        path: String,
    },

    /// A route path the router cannot accept.
    #[error("route {method} '{path}' is invalid: {reason}")]
    InvalidPath {
        /// HTTP method of the route.
        method: Method,
        /// The rejected path.
        path: String,
        /// What is wrong with it.
        reason: String,
    },

    /// A path that matches the same requests as an already registered one.
    #[error("route {method} {path} conflicts with already registered path {existing}")]
    RouteConflict {
        /// HTTP method of the new route.
        method: Method,
        /// Path of the new route.
        path: String,
        /// The registered path it overlaps.
        existing: String,
    },

    /// The HTTP router refused a path while the server was being assembled.
    #[error("router rejected path {path}: {reason}")]
    RouterRejected {
        /// The refused path.
        path: String,
        /// The router's explanation.
        reason: String,
    },

    /// A route was registered under a scope from a different registry.
    #[error("route {method} {path} was registered under scope '{scope}', which belongs to another registry")]
    ForeignScope {
        /// HTTP method of the route.
        method: Method,
        /// Path of the route.
        path: String,
        /// Path of the foreign scope.
        scope: String,
    },

    /// A scope lost its link to the root before resolution.
    #[error("scope '{scope}' is detached from its root")]
    DetachedScope {
        /// Path of the detached scope.
        scope: String,
    },

    /// The schema for a route failed to compile.
    #[error("failed to compile body schema for {method} {path}: {source}")]
    CompileFailed {
        /// HTTP method of the route.
        method: Method,
        /// Path of the route.
        path: String,
        /// Underlying compiler failure.
        #[source]
        source: CompileError,
    },

    /// `finalize` was called on an already finalized registry.
    #[error("route registry is already finalized")]
    AlreadyFinalized,

    /// A route was registered after finalize.
    #[error("cannot register {method} {path}: route registry is already finalized")]
    Sealed {
        /// HTTP method of the late route.
        method: Method,
        /// Path of the late route.
        path: String,
    },
}
