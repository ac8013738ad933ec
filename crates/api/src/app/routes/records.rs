//! Generic record routes, instantiated once per catalog resource:
//!
//! - `GET    /api/<module>/<name>`             list
//! - `POST   /api/<module>/<name>`             create
//! - `GET    /api/<module>/<name>/:id`         fetch one
//! - `PATCH  /api/<module>/<name>/:id`         partial update
//! - `DELETE /api/<module>/<name>/:id`         delete
//! - `POST   /api/<module>/<name>/:id/:action` status action

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path, rejection::JsonRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde_json::Value;

use keel_core::ResourceDef;

use crate::app::services::AppServices;
use crate::app::{dto, errors};
use crate::context::TenantContext;

pub fn router(def: ResourceDef) -> Router {
    let collection = def.collection_path();
    Router::new()
        .route(&collection, get(list_records).post(create_record))
        .route(
            &format!("{collection}/:id"),
            get(get_record).patch(update_record).delete(delete_record),
        )
        .route(&format!("{collection}/:id/:action"), post(run_action))
        .layer(Extension(def))
}

pub async fn list_records(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(def): Extension<ResourceDef>,
    Extension(tenant): Extension<TenantContext>,
) -> Response {
    match services.records.list(tenant.tenant_id(), &def).await {
        Ok(records) => (StatusCode::OK, Json(dto::records_to_json(records))).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn create_record(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(def): Extension<ResourceDef>,
    Extension(tenant): Extension<TenantContext>,
    body: Result<Json<Value>, JsonRejection>,
) -> Response {
    let Json(body) = match body {
        Ok(b) => b,
        Err(e) => return errors::json_rejection_to_response(e),
    };

    match services.records.create(tenant.tenant_id(), &def, &body).await {
        Ok(record) => (StatusCode::CREATED, Json(record.to_json())).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn get_record(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(def): Extension<ResourceDef>,
    Extension(tenant): Extension<TenantContext>,
    Path(id): Path<String>,
) -> Response {
    let id = match errors::parse_record_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match services.records.get(tenant.tenant_id(), &def, id).await {
        Ok(record) => (StatusCode::OK, Json(record.to_json())).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn update_record(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(def): Extension<ResourceDef>,
    Extension(tenant): Extension<TenantContext>,
    Path(id): Path<String>,
    body: Result<Json<Value>, JsonRejection>,
) -> Response {
    let id = match errors::parse_record_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let Json(body) = match body {
        Ok(b) => b,
        Err(e) => return errors::json_rejection_to_response(e),
    };

    match services.records.patch(tenant.tenant_id(), &def, id, &body).await {
        Ok(record) => (StatusCode::OK, Json(record.to_json())).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn delete_record(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(def): Extension<ResourceDef>,
    Extension(tenant): Extension<TenantContext>,
    Path(id): Path<String>,
) -> Response {
    let id = match errors::parse_record_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match services.records.delete(tenant.tenant_id(), &def, id).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn run_action(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(def): Extension<ResourceDef>,
    Extension(tenant): Extension<TenantContext>,
    Path((id, action)): Path<(String, String)>,
) -> Response {
    let id = match errors::parse_record_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match services.records.transition(tenant.tenant_id(), &def, id, &action).await {
        Ok(record) => (StatusCode::OK, Json(record.to_json())).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}
