//! HTTP API application wiring (Axum router + service wiring).
//!
//! - `services.rs`: user directory, card service and the credential codec
//! - `routes/`: HTTP routes + handlers (one file per service)
//! - `dto.rs`: request/response DTOs
//! - `extract.rs`: body/query extractors with JSON rejections
//! - `errors.rs`: consistent error responses

use std::sync::Arc;

use axum::{Extension, Router};
use tower::ServiceBuilder;

use cyberbank_auth::ConfigurationError;

use crate::config::AppConfig;
use crate::middleware::Gatekeeper;

pub mod dto;
pub mod errors;
pub mod extract;
pub mod routes;
pub mod services;

/// Build the full HTTP router (public entrypoint used by `main.rs`).
///
/// Fails when any guarded route declares an unusable credential source.
pub fn build_app(config: &AppConfig) -> Result<Router, ConfigurationError> {
    let services = Arc::new(services::AppServices::new(config));
    let gates = Gatekeeper::new(services.codec.clone(), &config.credential_header)?;

    Ok(routes::router(&gates)?.layer(ServiceBuilder::new().layer(Extension(services))))
}
