//! HTTP application wiring (Axum router + service wiring).
//!
//! - `services.rs`: storage backends, record service and token signing
//! - `routes/`: HTTP routes + handlers
//! - `dto.rs`: response DTOs and JSON mapping helpers
//! - `errors.rs`: consistent error responses

use std::sync::Arc;

use axum::{Extension, Router, routing::get};
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::config::ApiConfig;
use crate::middleware;

pub mod dto;
pub mod errors;
pub mod routes;
pub mod services;

use services::AppServices;

/// Build the full HTTP router for a configuration (entrypoint used by `main.rs`).
pub async fn build_app(config: &ApiConfig) -> anyhow::Result<Router> {
    let services = services::build_services(config).await?;
    Ok(build_router(Arc::new(services)))
}

/// Build the router over already-constructed services.
pub fn build_router(services: Arc<AppServices>) -> Router {
    let auth_state = middleware::AuthState {
        jwt: services.jwt.clone(),
    };

    // Protected routes: require a bearer token (tenant + principal context).
    let protected = routes::protected_router(&services.catalog).layer(
        axum::middleware::from_fn_with_state(auth_state, middleware::auth_middleware),
    );

    Router::new()
        .route("/health", get(routes::system::health))
        .nest("/api/auth", routes::auth::router())
        .merge(protected)
        .fallback(routes::system::not_found)
        .layer(Extension(services))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive()),
        )
}
