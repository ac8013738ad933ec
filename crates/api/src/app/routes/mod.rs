use axum::{Router, routing::get};

use keel_core::Catalog;

pub mod auth;
pub mod records;
pub mod system;

/// Router for all authenticated (tenant-scoped) endpoints: session info,
/// the catalog, and the CRUD + action routes of every catalog resource.
pub fn protected_router(catalog: &Catalog) -> Router {
    catalog.iter().fold(
        Router::new()
            .route("/api/whoami", get(system::whoami))
            .route("/api/catalog", get(system::catalog)),
        |router, def| router.merge(records::router(*def)),
    )
}
