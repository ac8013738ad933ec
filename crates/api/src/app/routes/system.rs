use std::sync::Arc;

use axum::{Json, extract::Extension, http::StatusCode, response::IntoResponse};

use crate::app::errors;
use crate::app::services::AppServices;
use crate::context::{PrincipalContext, TenantContext};

pub async fn health() -> StatusCode {
    StatusCode::OK
}

pub async fn whoami(
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
) -> impl IntoResponse {
    Json(serde_json::json!({
        "tenant_id": tenant.tenant_id().to_string(),
        "user_id": principal.user_id().to_string(),
        "email": principal.email(),
    }))
}

/// Resource definitions, so clients can build forms and lists.
pub async fn catalog(Extension(services): Extension<Arc<AppServices>>) -> impl IntoResponse {
    Json(serde_json::json!({
        "resources": services.catalog.iter().map(|def| {
            serde_json::json!({
                "key": def.key(),
                "path": def.collection_path(),
                "label": def.label,
                "fields": def.fields,
                "lifecycle": def.lifecycle,
            })
        }).collect::<Vec<_>>(),
    }))
}

pub async fn not_found() -> axum::response::Response {
    errors::json_error(StatusCode::NOT_FOUND, "not_found", "no such route")
}
