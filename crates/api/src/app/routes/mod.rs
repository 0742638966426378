use axum::{routing::get, Router};

use cyberbank_auth::ConfigurationError;

use crate::middleware::Gatekeeper;

pub mod auth;
pub mod cards;
pub mod system;

/// Router for every `/api` endpoint. Guards are resolved here, once.
pub fn router(gates: &Gatekeeper) -> Result<Router, ConfigurationError> {
    Ok(Router::new()
        .route("/health", get(system::health))
        .nest("/api/auth", auth::router(gates)?)
        .nest("/api/card", cards::router(gates)))
}
