//! HTTP API application wiring (Axum router + service wiring).
//!
//! - `services.rs`: registry, directory and gate built from configuration
//! - `routes/`: HTTP routes + handlers (one file per resource)
//! - `dto.rs`: request DTOs and the success envelope
//! - `errors.rs`: denial and error responses

use std::sync::Arc;

use axum::{Extension, Router, routing::get};
use tower::ServiceBuilder;

use crate::middleware;

pub mod dto;
pub mod errors;
pub mod routes;
pub mod services;

/// Build the full HTTP router (public entrypoint used by `main.rs`).
pub fn build_app(services: Arc<services::AppServices>) -> Router {
    // Every resource under /api goes through the authorization gate,
    // unmatched paths included.
    let protected = routes::router().layer(axum::middleware::from_fn_with_state(
        services.clone(),
        middleware::authorize,
    ));

    // Session endpoints only need a valid credential.
    let session = routes::auth::router().layer(axum::middleware::from_fn_with_state(
        services.clone(),
        middleware::authenticate,
    ));

    let api = Router::new().nest("/auth", session).merge(protected);

    Router::new()
        .route("/health", get(routes::system::health))
        .nest("/api", api)
        .layer(ServiceBuilder::new().layer(Extension(services)))
}
