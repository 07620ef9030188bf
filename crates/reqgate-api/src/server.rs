//! # Server Builder
//!
//! Registration mirrors nested plugin registration: the [`Server`] owns the
//! root scope, and [`Scope::register`] opens a child scope whose compiler
//! override (if any) applies to its own routes and those of its
//! descendants only.
//!
//! ```ignore
//! let mut server = Server::new(AppConfig::default());
//! server.post("/", RouteOptions::new().with_schema(schema), echo)?;
//! server.register("strict", |scope| {
//!     scope.set_schema_compiler(always_fail)?;
//!     scope.post("/strict", RouteOptions::new().with_schema(schema), echo)?;
//!     Ok(())
//! })?;
//! let router = server.build()?;
//! ```
//!
//! [`Server::build`] finalizes the registry (every schema is compiled here,
//! and a compile failure is returned instead of a router) and assembles the
//! axum [`Router`]. Each route's endpoint parses the body, runs the route's
//! precompiled validator through [`validate_request`], and either calls the
//! handler with the accepted value or answers 400. `GET` and `HEAD` requests
//! without a body carry no payload to validate and reach the handler with
//! `null`.

use std::collections::BTreeMap;
use std::future::Future;
use std::panic::{self, AssertUnwindSafe};
use std::pin::Pin;
use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::rejection::BytesRejection;
use axum::extract::DefaultBodyLimit;
use axum::middleware::from_fn;
use axum::response::{IntoResponse, Response};
use axum::routing::{MethodFilter, MethodRouter};
use axum::{Extension, Router};
use reqgate_core::{
    panic_message, validate_request, ConfigurationError, Method, RouteEntry, RouteOptions, RouteRegistry,
    ScopeNode, SharedCompiler, ValidationOutcome,
};
use reqgate_schema::DefaultEngine;

use crate::config::AppConfig;
use crate::error::ApiError;
use crate::extractors::{parse_body, ValidatedBody};
use crate::middleware::metrics::{metrics_middleware, RequestMetrics};
use crate::middleware::tracing_layer;

/// Liveness probe path, mounted unless a route already claims `GET` on it.
pub const LIVENESS_PATH: &str = "/health/liveness";

type BoxFuture = Pin<Box<dyn Future<Output = Response> + Send>>;
type BoxedHandler = Arc<dyn Fn(ValidatedBody) -> BoxFuture + Send + Sync>;

fn erase<H, Fut, R>(handler: H) -> BoxedHandler
where
    H: Fn(ValidatedBody) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = R> + Send + 'static,
    R: IntoResponse,
{
    Arc::new(move |body: ValidatedBody| -> BoxFuture {
        let fut = handler(body);
        Box::pin(async move { fut.await.into_response() })
    })
}

struct RouteTable {
    registry: RouteRegistry,
    handlers: Vec<(Arc<RouteEntry>, BoxedHandler)>,
}

macro_rules! method_shortcuts {
    ($($name:ident => $method:ident),* $(,)?) => {$(
        #[doc = concat!("Register a `", stringify!($method), "` route. See [`route`](Self::route).")]
        pub fn $name<H, Fut, R>(
            &mut self,
            path: &str,
            options: RouteOptions,
            handler: H,
        ) -> Result<&mut Self, ConfigurationError>
        where
            H: Fn(ValidatedBody) -> Fut + Send + Sync + 'static,
            Fut: Future<Output = R> + Send + 'static,
            R: IntoResponse,
        {
            self.route(Method::$method, path, options, handler)
        }
    )*};
}

/// A registration scope. Routes registered here belong to this scope's
/// node in the scope tree.
pub struct Scope<'a> {
    node: Arc<ScopeNode>,
    table: &'a mut RouteTable,
}

impl Scope<'_> {
    /// The scope tree node backing this scope.
    pub fn node(&self) -> &Arc<ScopeNode> {
        &self.node
    }

    /// Override the schema compiler for this scope and its descendants.
    ///
    /// # Errors
    ///
    /// [`ConfigurationError::DuplicateCompiler`] on a second call.
    pub fn set_schema_compiler(&self, compiler: SharedCompiler) -> Result<(), ConfigurationError> {
        self.node.set_schema_compiler(compiler)
    }

    /// Register a route whose body is validated before `handler` runs.
    ///
    /// # Errors
    ///
    /// Registration errors from [`RouteRegistry::register_route`].
    pub fn route<H, Fut, R>(
        &mut self,
        method: Method,
        path: &str,
        options: RouteOptions,
        handler: H,
    ) -> Result<&mut Self, ConfigurationError>
    where
        H: Fn(ValidatedBody) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = R> + Send + 'static,
        R: IntoResponse,
    {
        let entry = self
            .table
            .registry
            .register_route(&self.node, method, path, options)?;
        self.table.handlers.push((entry, erase(handler)));
        Ok(self)
    }

    method_shortcuts! {
        get => Get,
        head => Head,
        post => Post,
        put => Put,
        patch => Patch,
        delete => Delete,
        options => Options,
    }

    /// Open a child scope named `name` and run `f` against it.
    ///
    /// # Errors
    ///
    /// Whatever `f` returns.
    pub fn register<F>(&mut self, name: &str, f: F) -> Result<&mut Self, ConfigurationError>
    where
        F: FnOnce(&mut Scope<'_>) -> Result<(), ConfigurationError>,
    {
        let mut child = Scope {
            node: self.node.child(name),
            table: &mut *self.table,
        };
        f(&mut child)?;
        Ok(self)
    }
}

/// HTTP server under construction.
pub struct Server {
    config: AppConfig,
    table: RouteTable,
    metrics: RequestMetrics,
}

impl Server {
    /// A server whose default compiler is [`DefaultEngine`] configured from
    /// `config.engine`.
    pub fn new(config: AppConfig) -> Self {
        let engine = DefaultEngine::new(config.engine);
        Self::with_default_compiler(config, Arc::new(engine))
    }

    /// A server whose root falls back to `compiler`, e.g. a
    /// [`DefaultEngine`] with shared schemas registered.
    pub fn with_default_compiler(config: AppConfig, compiler: SharedCompiler) -> Self {
        Self {
            config,
            table: RouteTable {
                registry: RouteRegistry::new(compiler),
                handlers: Vec::new(),
            },
            metrics: RequestMetrics::new(),
        }
    }

    /// The configuration the server was created with.
    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Counters shared with the built router.
    pub fn metrics(&self) -> RequestMetrics {
        self.metrics.clone()
    }

    /// Routes registered so far, in registration order.
    pub fn routes(&self) -> &[Arc<RouteEntry>] {
        self.table.registry.routes()
    }

    /// The root registration scope.
    pub fn root(&mut self) -> Scope<'_> {
        Scope {
            node: Arc::clone(self.table.registry.root()),
            table: &mut self.table,
        }
    }

    /// Override the compiler at the root. Shadows the default for every
    /// scope that does not set its own.
    ///
    /// # Errors
    ///
    /// [`ConfigurationError::DuplicateCompiler`] on a second call.
    pub fn set_schema_compiler(&self, compiler: SharedCompiler) -> Result<(), ConfigurationError> {
        self.table.registry.root().set_schema_compiler(compiler)
    }

    /// Register a route on the root scope.
    ///
    /// # Errors
    ///
    /// Registration errors from [`RouteRegistry::register_route`].
    pub fn route<H, Fut, R>(
        &mut self,
        method: Method,
        path: &str,
        options: RouteOptions,
        handler: H,
    ) -> Result<&mut Self, ConfigurationError>
    where
        H: Fn(ValidatedBody) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = R> + Send + 'static,
        R: IntoResponse,
    {
        self.root().route(method, path, options, handler)?;
        Ok(self)
    }

    method_shortcuts! {
        get => Get,
        head => Head,
        post => Post,
        put => Put,
        patch => Patch,
        delete => Delete,
        options => Options,
    }

    /// Open a child scope of the root named `name` and run `f` against it.
    ///
    /// # Errors
    ///
    /// Whatever `f` returns.
    pub fn register<F>(&mut self, name: &str, f: F) -> Result<&mut Self, ConfigurationError>
    where
        F: FnOnce(&mut Scope<'_>) -> Result<(), ConfigurationError>,
    {
        self.root().register(name, f)?;
        Ok(self)
    }

    /// Finalize validation and assemble the router.
    ///
    /// # Errors
    ///
    /// The first [`ConfigurationError`] from finalize, typically
    /// [`ConfigurationError::CompileFailed`], or
    /// [`ConfigurationError::RouterRejected`] if axum refuses a path.
    pub fn build(self) -> Result<Router, ConfigurationError> {
        let Server {
            config,
            table,
            metrics,
        } = self;
        let RouteTable {
            mut registry,
            handlers,
        } = table;
        registry.finalize()?;

        let mut by_path: BTreeMap<String, MethodRouter> = BTreeMap::new();
        for (route, handler) in handlers {
            let path = route.path().to_string();
            let filter = method_filter(route.method());
            let endpoint = endpoint(route, handler, metrics.clone());
            let methods = by_path.remove(&path).unwrap_or_else(MethodRouter::new);
            by_path.insert(path, methods.on(filter, endpoint));
        }
        if registry.lookup(Method::Get, LIVENESS_PATH).is_none() {
            let methods = by_path
                .remove(LIVENESS_PATH)
                .unwrap_or_else(MethodRouter::new);
            by_path.insert(LIVENESS_PATH.to_string(), methods.get(liveness));
        }

        let routes = by_path.len();
        let mut router = Router::new();
        for (path, methods) in by_path {
            router = insert_route(router, &path, methods)?;
        }
        let router = router
            .layer(DefaultBodyLimit::max(config.body_limit))
            .layer(from_fn(metrics_middleware))
            .layer(tracing_layer::layer())
            .layer(Extension(metrics));

        tracing::info!(
            paths = routes,
            body_limit = config.body_limit,
            "router assembled"
        );
        Ok(router)
    }
}

/// `Router::route` panics on paths it cannot insert; surface that as an error.
fn insert_route(
    router: Router,
    path: &str,
    methods: MethodRouter,
) -> Result<Router, ConfigurationError> {
    panic::catch_unwind(AssertUnwindSafe(|| router.route(path, methods))).map_err(|payload| {
        let reason = panic_message(payload.as_ref());
        tracing::error!(path, %reason, "router rejected path");
        ConfigurationError::RouterRejected {
            path: path.to_string(),
            reason,
        }
    })
}

fn method_filter(method: Method) -> MethodFilter {
    match method {
        Method::Get => MethodFilter::GET,
        Method::Head => MethodFilter::HEAD,
        Method::Post => MethodFilter::POST,
        Method::Put => MethodFilter::PUT,
        Method::Patch => MethodFilter::PATCH,
        Method::Delete => MethodFilter::DELETE,
        Method::Options => MethodFilter::OPTIONS,
    }
}

fn endpoint(
    route: Arc<RouteEntry>,
    handler: BoxedHandler,
    metrics: RequestMetrics,
) -> impl Fn(Result<Bytes, BytesRejection>) -> BoxFuture + Clone + Send + Sync + 'static {
    move |body: Result<Bytes, BytesRejection>| -> BoxFuture {
        Box::pin(dispatch(
            Arc::clone(&route),
            Arc::clone(&handler),
            metrics.clone(),
            body,
        ))
    }
}

async fn dispatch(
    route: Arc<RouteEntry>,
    handler: BoxedHandler,
    metrics: RequestMetrics,
    body: Result<Bytes, BytesRejection>,
) -> Response {
    let body = match parse_body(body) {
        Ok(body) => body,
        Err(err) => {
            tracing::debug!(method = %route.method(), path = %route.path(), error = %err, "unreadable request body");
            return err.into_response();
        }
    };
    if body.is_none() && matches!(route.method(), Method::Get | Method::Head) {
        return handler(ValidatedBody(serde_json::Value::Null)).await;
    }
    match validate_request(&route, body) {
        ValidationOutcome::Accepted(value) => handler(ValidatedBody(value)).await,
        ValidationOutcome::Rejected(detail) => {
            metrics.record_rejection(route.method(), route.path());
            ApiError::from(detail).into_response()
        }
    }
}

/// Liveness probe, always 200 while the process runs.
async fn liveness() -> &'static str {
    "ok"
}
