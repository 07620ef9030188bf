//! # Middleware Modules
//!
//! Tower middleware layers applied to every route built by
//! [`Server::build`](crate::Server::build).

pub mod metrics;
pub mod tracing_layer;
