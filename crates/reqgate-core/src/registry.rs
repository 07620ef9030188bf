//! # Route Registry & Finalize
//!
//! Routes are registered under a scope during startup. [`RouteRegistry::finalize`]
//! then compiles every declared schema exactly once. After finalize the
//! registry is sealed and each [`RouteEntry`] holds an immutable
//! [`CompiledValidator`]; request handling only reads it.
//!
//! ## Compiler Precedence
//!
//! 1. The route's own compiler ([`RouteOptions::with_compiler`]).
//! 2. The nearest scope override, walking from the owning scope to the root.
//! 3. The registry's default compiler.
//!
//! Routes without a schema skip resolution and get an accept-all validator.

use std::collections::HashMap;
use std::sync::{Arc, OnceLock};

use crate::compiler::{compile_guarded, CompiledValidator, SharedCompiler};
use crate::error::ConfigurationError;
use crate::method::Method;
use crate::path;
use crate::schema::SchemaDefinition;
use crate::scope::ScopeNode;

/// Per-route validation options.
#[derive(Clone, Default)]
pub struct RouteOptions {
    schema: Option<SchemaDefinition>,
    compiler: Option<SharedCompiler>,
}

impl RouteOptions {
    /// Options with no body schema.
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare the body schema.
    pub fn with_schema(mut self, schema: impl Into<SchemaDefinition>) -> Self {
        self.schema = Some(schema.into());
        self
    }

    /// Compile this route's schema with `compiler`, bypassing scope resolution.
    pub fn with_compiler(mut self, compiler: SharedCompiler) -> Self {
        self.compiler = Some(compiler);
        self
    }
}

impl std::fmt::Debug for RouteOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RouteOptions")
            .field("schema", &self.schema)
            .field("has_compiler", &self.compiler.is_some())
            .finish()
    }
}

/// One registered route.
pub struct RouteEntry {
    method: Method,
    path: String,
    scope: Arc<ScopeNode>,
    schema: Option<SchemaDefinition>,
    compiler: Option<SharedCompiler>,
    validator: OnceLock<CompiledValidator>,
}

impl RouteEntry {
    /// HTTP method.
    pub fn method(&self) -> Method {
        self.method
    }

    /// Route path as registered.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Owning scope.
    pub fn scope(&self) -> &Arc<ScopeNode> {
        &self.scope
    }

    /// Declared body schema, if any.
    pub fn schema(&self) -> Option<&SchemaDefinition> {
        self.schema.as_ref()
    }

    /// The compiled validator. `None` until finalize.
    pub fn validator(&self) -> Option<&CompiledValidator> {
        self.validator.get()
    }

    /// The compiler that applies to this route.
    ///
    /// # Errors
    ///
    /// Propagates [`ConfigurationError::DetachedScope`] from the scope walk.
    pub fn resolve_compiler(&self) -> Result<SharedCompiler, ConfigurationError> {
        match &self.compiler {
            Some(compiler) => Ok(Arc::clone(compiler)),
            None => self.scope.resolve_compiler(),
        }
    }

    fn compile(&self) -> Result<(), ConfigurationError> {
        if self.validator.get().is_some() {
            return Ok(());
        }
        let validator = match &self.schema {
            None => CompiledValidator::accept_all(),
            Some(schema) => {
                let compiler = self.resolve_compiler()?;
                compile_guarded(compiler.as_ref(), schema).map_err(|source| {
                    ConfigurationError::CompileFailed {
                        method: self.method,
                        path: self.path.clone(),
                        source,
                    }
                })?
            }
        };
        tracing::debug!(
            method = %self.method,
            path = %self.path,
            scope = %self.scope.path(),
            has_schema = self.schema.is_some(),
            "compiled route validator"
        );
        self.validator
            .set(validator)
            .map_err(|_| ConfigurationError::AlreadyFinalized)
    }
}

impl std::fmt::Debug for RouteEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RouteEntry")
            .field("method", &self.method)
            .field("path", &self.path)
            .field("scope", &self.scope.path())
            .field("schema", &self.schema)
            .field("compiled", &self.validator.get().is_some())
            .finish()
    }
}

/// All routes of one server, plus the scope tree they hang off.
#[derive(Debug)]
pub struct RouteRegistry {
    root: Arc<ScopeNode>,
    routes: Vec<Arc<RouteEntry>>,
    index: HashMap<(Method, String), usize>,
    finalized: bool,
}

impl RouteRegistry {
    /// Create a registry whose root scope falls back to `default_compiler`.
    pub fn new(default_compiler: SharedCompiler) -> Self {
        Self {
            root: ScopeNode::root(default_compiler),
            routes: Vec::new(),
            index: HashMap::new(),
            finalized: false,
        }
    }

    /// The root scope.
    pub fn root(&self) -> &Arc<ScopeNode> {
        &self.root
    }

    /// Register a route under `scope`.
    ///
    /// # Errors
    ///
    /// - [`ConfigurationError::Sealed`] after finalize.
    /// - [`ConfigurationError::InvalidPath`] if `path` is not absolute or has a
    ///   malformed capture.
    /// - [`ConfigurationError::ForeignScope`] if `scope` is not in this registry's tree.
    /// - [`ConfigurationError::DuplicateRoute`] if `(method, path)` is taken.
    /// - [`ConfigurationError::RouteConflict`] if another path has the same
    ///   shape, e.g. `/users/{id}` against `/users/{name}`.
    pub fn register_route(
        &mut self,
        scope: &Arc<ScopeNode>,
        method: Method,
        path: impl Into<String>,
        options: RouteOptions,
    ) -> Result<Arc<RouteEntry>, ConfigurationError> {
        let path = path.into();
        if self.finalized {
            return Err(ConfigurationError::Sealed { method, path });
        }
        if let Err(reason) = path::check(&path) {
            return Err(ConfigurationError::InvalidPath {
                method,
                path,
                reason,
            });
        }
        let in_tree = scope
            .root_of()
            .is_some_and(|root| Arc::ptr_eq(&root, &self.root));
        if !in_tree {
            return Err(ConfigurationError::ForeignScope {
                method,
                path,
                scope: scope.path(),
            });
        }
        let key = (method, path.clone());
        if self.index.contains_key(&key) {
            return Err(ConfigurationError::DuplicateRoute { method, path });
        }
        let shape = path::shape(&path);
        if let Some(existing) = self
            .routes
            .iter()
            .find(|route| route.path != path && path::shape(&route.path) == shape)
        {
            return Err(ConfigurationError::RouteConflict {
                method,
                path,
                existing: existing.path.clone(),
            });
        }

        let entry = Arc::new(RouteEntry {
            method,
            path,
            scope: Arc::clone(scope),
            schema: options.schema,
            compiler: options.compiler,
            validator: OnceLock::new(),
        });
        self.index.insert(key, self.routes.len());
        self.routes.push(Arc::clone(&entry));
        tracing::debug!(method = %method, path = %entry.path, scope = %scope.path(), "registered route");
        Ok(entry)
    }

    /// Compile every route's schema. Must succeed before serving requests.
    ///
    /// # Errors
    ///
    /// [`ConfigurationError::AlreadyFinalized`] on a second call, or the first
    /// resolution/compilation failure encountered.
    pub fn finalize(&mut self) -> Result<(), ConfigurationError> {
        if self.finalized {
            return Err(ConfigurationError::AlreadyFinalized);
        }
        for route in &self.routes {
            if let Err(err) = route.compile() {
                tracing::error!(error = %err, "route registry finalize failed");
                return Err(err);
            }
        }
        self.finalized = true;
        tracing::info!(routes = self.routes.len(), "route registry finalized");
        Ok(())
    }

    /// Whether [`finalize`](Self::finalize) has completed.
    pub fn is_finalized(&self) -> bool {
        self.finalized
    }

    /// Routes in registration order.
    pub fn routes(&self) -> &[Arc<RouteEntry>] {
        &self.routes
    }

    /// Look up a route by method and exact path.
    pub fn lookup(&self, method: Method, path: &str) -> Option<&Arc<RouteEntry>> {
        self.index
            .get(&(method, path.to_string()))
            .and_then(|&i| self.routes.get(i))
    }

    /// Number of registered routes.
    pub fn len(&self) -> usize {
        self.routes.len()
    }

    /// Whether no routes are registered.
    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::compiler_fn;
    use crate::error::CompileError;
    use crate::outcome::ValidationOutcome;
    use serde_json::{json, Value};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn tagging(tag: &'static str) -> SharedCompiler {
        compiler_fn(move |_schema| {
            Ok(CompiledValidator::from_fn(move |body| {
                ValidationOutcome::Accepted(json!({ "tag": tag, "body": body }))
            }))
        })
    }

    fn tag_of(route: &RouteEntry) -> Value {
        match route.validator().unwrap().validate(&json!(1)) {
            ValidationOutcome::Accepted(v) => v["tag"].clone(),
            ValidationOutcome::Rejected(d) => panic!("unexpected rejection: {d}"),
        }
    }

    fn schema() -> RouteOptions {
        RouteOptions::new().with_schema(json!({"type": "object"}))
    }

    #[test]
    fn finalize_compiles_each_schema_once() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let mut registry = RouteRegistry::new(compiler_fn(move |_schema| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(CompiledValidator::accept_all())
        }));
        let root = Arc::clone(registry.root());
        registry.register_route(&root, Method::Post, "/a", schema()).unwrap();
        registry.register_route(&root, Method::Put, "/a", schema()).unwrap();
        registry.register_route(&root, Method::Get, "/b", RouteOptions::new()).unwrap();

        assert!(registry.routes().iter().all(|r| r.validator().is_none()));
        registry.finalize().unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert!(registry.routes().iter().all(|r| r.validator().is_some()));

        // Repeated validation never recompiles.
        let route = registry.lookup(Method::Post, "/a").unwrap();
        for _ in 0..3 {
            route.validator().unwrap().validate(&json!({}));
        }
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn route_without_schema_is_passthrough_and_skips_resolution() {
        let mut registry = RouteRegistry::new(compiler_fn(|_schema| {
            Err("default compiler must not run".into())
        }));
        let root = Arc::clone(registry.root());
        registry.register_route(&root, Method::Post, "/raw", RouteOptions::new()).unwrap();
        registry.finalize().unwrap();

        let body = json!({"anything": true});
        let route = registry.lookup(Method::Post, "/raw").unwrap();
        assert_eq!(
            route.validator().unwrap().validate(&body),
            ValidationOutcome::Accepted(body.clone())
        );
    }

    #[test]
    fn precedence_route_then_scope_then_default() {
        let mut registry = RouteRegistry::new(tagging("default"));
        let root = Arc::clone(registry.root());
        let plugin = root.child("plugin");
        plugin.set_schema_compiler(tagging("plugin")).unwrap();
        let sibling = root.child("sibling");

        let on_root = registry.register_route(&root, Method::Post, "/", schema()).unwrap();
        let in_plugin = registry
            .register_route(&plugin, Method::Post, "/plugin", schema())
            .unwrap();
        let route_level = registry
            .register_route(
                &plugin,
                Method::Post,
                "/plugin/custom",
                schema().with_compiler(tagging("route")),
            )
            .unwrap();
        let in_sibling = registry
            .register_route(&sibling, Method::Post, "/sibling", schema())
            .unwrap();
        registry.finalize().unwrap();

        assert_eq!(tag_of(&on_root), "default");
        assert_eq!(tag_of(&in_plugin), "plugin");
        assert_eq!(tag_of(&route_level), "route");
        assert_eq!(tag_of(&in_sibling), "default");
    }

    #[test]
    fn compile_error_aborts_finalize() {
        let mut registry = RouteRegistry::new(tagging("default"));
        let root = Arc::clone(registry.root());
        let broken = root.child("broken");
        broken
            .set_schema_compiler(compiler_fn(|_schema| Err("unknown keyword".into())))
            .unwrap();
        registry.register_route(&broken, Method::Post, "/bad", schema()).unwrap();

        let err = registry.finalize().unwrap_err();
        match err {
            ConfigurationError::CompileFailed { method, path, source } => {
                assert_eq!(method, Method::Post);
                assert_eq!(path, "/bad");
                assert_eq!(source, CompileError::Invalid("unknown keyword".to_string()));
            }
            other => panic!("expected CompileFailed, got: {other}"),
        }
        assert!(!registry.is_finalized());
    }

    #[test]
    fn compiler_panic_aborts_finalize() {
        let mut registry = RouteRegistry::new(compiler_fn(|_schema| panic!("engine bug")));
        let root = Arc::clone(registry.root());
        registry.register_route(&root, Method::Post, "/", schema()).unwrap();
        let err = registry.finalize().unwrap_err();
        assert!(matches!(
            err,
            ConfigurationError::CompileFailed { source: CompileError::Panicked(ref m), .. } if m == "engine bug"
        ));
    }

    #[test]
    fn duplicate_route_rejected() {
        let mut registry = RouteRegistry::new(tagging("default"));
        let root = Arc::clone(registry.root());
        let child = root.child("child");
        registry.register_route(&root, Method::Post, "/x", schema()).unwrap();
        let err = registry
            .register_route(&child, Method::Post, "/x", schema())
            .unwrap_err();
        assert!(matches!(err, ConfigurationError::DuplicateRoute { .. }));
        // Same path, different method is fine.
        registry.register_route(&child, Method::Patch, "/x", schema()).unwrap();
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn relative_path_rejected() {
        let mut registry = RouteRegistry::new(tagging("default"));
        let root = Arc::clone(registry.root());
        assert!(matches!(
            registry.register_route(&root, Method::Get, "users", schema()),
            Err(ConfigurationError::InvalidPath { .. })
        ));
        assert!(registry.is_empty());
    }

    #[test]
    fn legacy_capture_syntax_rejected() {
        let mut registry = RouteRegistry::new(tagging("default"));
        let root = Arc::clone(registry.root());
        match registry.register_route(&root, Method::Post, "/users/:id", schema()) {
            Err(ConfigurationError::InvalidPath { path, reason, .. }) => {
                assert_eq!(path, "/users/:id");
                assert!(reason.contains("{name}"), "got: {reason}");
            }
            other => panic!("expected InvalidPath, got: {other:?}"),
        }
        assert!(registry.is_empty());
    }

    #[test]
    fn same_shape_paths_conflict_across_methods() {
        let mut registry = RouteRegistry::new(tagging("default"));
        let root = Arc::clone(registry.root());
        registry.register_route(&root, Method::Post, "/users/{id}", schema()).unwrap();
        registry.register_route(&root, Method::Get, "/users/{id}", schema()).unwrap();
        match registry.register_route(&root, Method::Put, "/users/{name}", schema()) {
            Err(ConfigurationError::RouteConflict { path, existing, .. }) => {
                assert_eq!(path, "/users/{name}");
                assert_eq!(existing, "/users/{id}");
            }
            other => panic!("expected RouteConflict, got: {other:?}"),
        }
        registry.register_route(&root, Method::Put, "/users/me", schema()).unwrap();
        assert_eq!(registry.len(), 3);
    }

    #[test]
    fn registry_is_sealed_after_finalize() {
        let mut registry = RouteRegistry::new(tagging("default"));
        let root = Arc::clone(registry.root());
        registry.finalize().unwrap();
        assert!(registry.is_empty());
        assert!(matches!(
            registry.register_route(&root, Method::Post, "/late", schema()),
            Err(ConfigurationError::Sealed { .. })
        ));
        assert!(matches!(
            registry.finalize(),
            Err(ConfigurationError::AlreadyFinalized)
        ));
    }

    #[test]
    fn foreign_scope_rejected() {
        let mut registry = RouteRegistry::new(tagging("default"));
        let other = RouteRegistry::new(tagging("other"));
        let foreign = other.root().child("plugin");
        let err = registry
            .register_route(&foreign, Method::Post, "/", schema())
            .unwrap_err();
        assert!(matches!(err, ConfigurationError::ForeignScope { .. }));
    }

    #[test]
    fn late_scope_override_applies_at_finalize() {
        let mut registry = RouteRegistry::new(tagging("default"));
        let root = Arc::clone(registry.root());
        let plugin = root.child("plugin");
        let route = registry
            .register_route(&plugin.child("nested"), Method::Post, "/n", schema())
            .unwrap();
        plugin.set_schema_compiler(tagging("late")).unwrap();
        registry.finalize().unwrap();
        assert_eq!(tag_of(&route), "late");
    }
}
