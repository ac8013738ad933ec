//! Public session endpoints: `POST /api/auth/signup`, `POST /api/auth/login`.

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, rejection::JsonRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::post,
};
use chrono::Utc;

use keel_auth::{AuthError, Credentials, UserAccount};
use keel_core::TenantId;
use keel_infra::StoreError;

use crate::app::services::AppServices;
use crate::app::{dto, errors};

pub fn router() -> Router {
    Router::new()
        .route("/signup", post(signup))
        .route("/login", post(login))
}

/// Register a user. Every signup opens a new tenant owned by that user.
pub async fn signup(
    Extension(services): Extension<Arc<AppServices>>,
    body: Result<Json<Credentials>, JsonRejection>,
) -> Response {
    let Json(credentials) = match body {
        Ok(b) => b,
        Err(e) => return errors::json_rejection_to_response(e),
    };

    let account = match UserAccount::register(&credentials, TenantId::new(), Utc::now()) {
        Ok(a) => a,
        Err(e) => return errors::json_error(StatusCode::BAD_REQUEST, "validation_error", e.to_string()),
    };

    let account = match services.users.create(account).await {
        Ok(a) => a,
        Err(StoreError::Conflict(_)) => {
            return errors::json_error(StatusCode::CONFLICT, "email_taken", "email is already registered");
        }
        Err(e) => {
            tracing::error!(error = %e, "failed to store user account");
            return errors::json_error(StatusCode::INTERNAL_SERVER_ERROR, "store_error", e.to_string());
        }
    };

    tracing::info!(user_id = %account.id, tenant_id = %account.tenant_id, "user signed up");
    session_response(&services, &account, StatusCode::CREATED)
}

pub async fn login(
    Extension(services): Extension<Arc<AppServices>>,
    body: Result<Json<Credentials>, JsonRejection>,
) -> Response {
    let Json(credentials) = match body {
        Ok(b) => b,
        Err(e) => return errors::json_rejection_to_response(e),
    };

    let account = match services.users.find_by_email(&credentials.normalized_email()).await {
        Ok(Some(a)) if a.verify(&credentials.password) => a,
        Ok(found) => {
            if found.is_none() {
                keel_auth::reject_unknown_account(&credentials.password);
            }
            return errors::json_error(
                StatusCode::UNAUTHORIZED,
                "invalid_credentials",
                AuthError::InvalidCredentials.to_string(),
            );
        }
        Err(e) => {
            tracing::error!(error = %e, "failed to load user account");
            return errors::json_error(StatusCode::INTERNAL_SERVER_ERROR, "store_error", e.to_string());
        }
    };

    tracing::info!(user_id = %account.id, "user logged in");
    session_response(&services, &account, StatusCode::OK)
}

fn session_response(services: &AppServices, account: &UserAccount, status: StatusCode) -> Response {
    match services.issue_token(account) {
        Ok(token) => (
            status,
            Json(dto::AuthResponse {
                token,
                user: dto::UserSummary::from(account),
            }),
        )
            .into_response(),
        Err(e) => {
            tracing::error!(error = %e, "failed to sign session token");
            errors::json_error(StatusCode::INTERNAL_SERVER_ERROR, "token_error", e.to_string())
        }
    }
}
