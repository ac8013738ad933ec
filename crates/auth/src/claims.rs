use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use keel_core::{TenantId, UserId};

/// Claims carried by a session token: who the caller is and which tenant
/// every request is scoped to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JwtClaims {
    #[serde(rename = "id")]
    pub sub: UserId,

    pub email: String,

    #[serde(rename = "tenantId")]
    pub tenant_id: TenantId,

    #[serde(rename = "iat", with = "chrono::serde::ts_seconds")]
    pub issued_at: DateTime<Utc>,

    #[serde(rename = "exp", with = "chrono::serde::ts_seconds")]
    pub expires_at: DateTime<Utc>,
}

impl JwtClaims {
    pub fn new(sub: UserId, email: impl Into<String>, tenant_id: TenantId, now: DateTime<Utc>, ttl: Duration) -> Self {
        Self {
            sub,
            email: email.into(),
            tenant_id,
            issued_at: now,
            expires_at: now + ttl,
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TokenValidationError {
    #[error("token has expired")]
    Expired,

    #[error("token not yet valid (issued_at is in the future)")]
    NotYetValid,

    #[error("invalid token time window (expires_at <= issued_at)")]
    InvalidTimeWindow,

    /// Bad encoding or signature.
    #[error("malformed token: {0}")]
    Malformed(String),
}

/// Deterministically validate the time window of a set of claims.
///
/// Signature verification happens in [`crate::jwt`]; this only looks at the
/// decoded claims and an explicit `now`.
pub fn validate_claims(claims: &JwtClaims, now: DateTime<Utc>) -> Result<(), TokenValidationError> {
    if claims.expires_at <= claims.issued_at {
        return Err(TokenValidationError::InvalidTimeWindow);
    }
    if now < claims.issued_at {
        return Err(TokenValidationError::NotYetValid);
    }
    if now >= claims.expires_at {
        return Err(TokenValidationError::Expired);
    }
    Ok(())
}
