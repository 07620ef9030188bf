//! # reqgate-api — Axum Integration
//!
//! Glues the validation core onto an axum router.
//!
//! ## Request Path
//!
//! TraceLayer → MetricsLayer → body limit → route endpoint
//!
//! The endpoint reads the raw body, parses JSON, runs the route's
//! precompiled validator and, only on acceptance, calls the handler with a
//! [`ValidatedBody`]. Rejections never reach the handler and are answered
//! with the uniform 400 body described in [`error`].
//!
//! ## Routes Added by the Server
//!
//! - `/health/liveness` (unless the application registers `GET` there).
//!
//! ## Crate Policy
//!
//! - Sits at the top of the dependency DAG.
//! - All errors map to structured HTTP responses via [`ApiError`].

pub mod config;
pub mod error;
pub mod extractors;
pub mod middleware;
pub mod server;
pub mod telemetry;

pub use config::{AppConfig, ConfigError, LogFormat};
pub use error::{ApiError, ErrorBody};
pub use extractors::ValidatedBody;
pub use server::{Scope, Server};
