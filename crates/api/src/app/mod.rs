//! HTTP API application wiring (Axum router + service wiring).
//!
//! - `services.rs`: collaborator wiring (directory, batch store, import log, writer, pipeline)
//! - `routes/`: HTTP routes + handlers (one file per area)
//! - `dto.rs`: request/response DTOs and path parsing
//! - `errors.rs`: consistent error responses

use std::sync::Arc;

use axum::{Extension, Router};
use tower::ServiceBuilder;

use remitflow_infra::PipelineConfig;

pub mod dto;
pub mod errors;
pub mod routes;
pub mod services;

/// Build the full HTTP router (public entrypoint used by `main.rs`).
///
/// Fails only if the directory writer thread cannot be started.
pub fn build_app(config: &PipelineConfig) -> std::io::Result<Router> {
    let services = Arc::new(services::build_services(config)?);

    Ok(routes::router()
        .layer(Extension(services))
        .layer(ServiceBuilder::new()))
}
