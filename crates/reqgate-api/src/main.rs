//! # reqgate-api — Binary Entry Point
//!
//! Serves a small demonstration API exercising each way a body can be
//! validated: the default engine, a route-level compiler, a hand-written
//! validator and a scope-level override. Binds to `PORT` (default 8080).
//! Prometheus metrics are exposed on `/metrics`.

use axum::routing::get;
use axum::Json;
use metrics_exporter_prometheus::PrometheusBuilder;
use reqgate_api::{telemetry, AppConfig, Server, ValidatedBody};
use reqgate_core::{compiler_fn, CompiledValidator, RouteOptions};
use reqgate_schema::{DefaultEngine, EngineOptions};
use serde_json::{json, Value};
use std::sync::Arc;

async fn echo(body: ValidatedBody) -> Json<Value> {
    Json(body.into_inner())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let config = AppConfig::from_env()?;
    telemetry::init_tracing(config.log_format)?;
    tracing::info!(?config, "configuration loaded");

    let prometheus = PrometheusBuilder::new().install_recorder()?;

    let hello = json!({
        "type": "object",
        "properties": { "hello": { "type": "integer" } }
    });
    let closed_hello = json!({
        "type": "object",
        "properties": { "hello": { "type": "integer" } },
        "additionalProperties": false
    });

    let mut server = Server::new(config.clone());
    server
        .post("/", RouteOptions::new().with_schema(hello), echo)?
        .post(
            "/custom",
            RouteOptions::new()
                .with_schema(closed_hello)
                .with_compiler(Arc::new(DefaultEngine::new(EngineOptions {
                    coerce_types: true,
                    remove_additional: true,
                    all_errors: true,
                }))),
            echo,
        )?
        .post(
            "/greeting",
            RouteOptions::new()
                .with_schema(json!({"hello": "string, required"}))
                .with_compiler(compiler_fn(|_schema| {
                    Ok(CompiledValidator::from_result_fn(|body: &Value| {
                        match body.get("hello") {
                            Some(Value::String(_)) => Ok(body.clone()),
                            Some(_) => Err(r#"child "hello" fails because ["hello" must be a string]"#),
                            None => Err(r#"child "hello" fails because ["hello" is required]"#),
                        }
                    }))
                })),
            echo,
        )?;
    server.register("strict", |scope| {
        scope.set_schema_compiler(compiler_fn(|_schema| {
            Ok(CompiledValidator::from_result_fn(|_body: &Value| {
                Err::<Value, _>("Always fail!")
            }))
        }))?;
        scope.post(
            "/plugin/custom",
            RouteOptions::new().with_schema(json!({
                "type": "object",
                "properties": {},
                "additionalProperties": false
            })),
            |_body: ValidatedBody| async { Json(json!({"hello": "never here!"})) },
        )?;
        Ok(())
    })?;

    let app = server
        .build()?
        .route("/metrics", get(move || async move { prometheus.render() }));

    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!("reqgate API listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
