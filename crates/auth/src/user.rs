//! User accounts and the credentials used to create or log into them.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use keel_core::{TenantId, UserId};

use crate::{AuthError, JwtClaims, hash_password, verify_password};

const MIN_PASSWORD_LEN: usize = 8;

/// E-mail + password pair as submitted by signup/login forms.
#[derive(Clone, PartialEq, Eq, Deserialize)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

impl core::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Credentials")
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .finish()
    }
}

impl Credentials {
    pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            password: password.into(),
        }
    }

    /// Lower-cased, trimmed e-mail used as the lookup key.
    pub fn normalized_email(&self) -> String {
        self.email.trim().to_lowercase()
    }

    /// Shape checks applied at signup.
    pub fn validate(&self) -> Result<(), AuthError> {
        let email = self.normalized_email();
        let valid_email = match email.split_once('@') {
            Some((local, domain)) => {
                !local.is_empty() && domain.contains('.') && !domain.starts_with('.') && !domain.ends_with('.')
            }
            None => false,
        };
        if !valid_email {
            return Err(AuthError::Validation("email address is not valid".into()));
        }
        if self.password.chars().count() < MIN_PASSWORD_LEN {
            return Err(AuthError::Validation(format!(
                "password must be at least {MIN_PASSWORD_LEN} characters"
            )));
        }
        Ok(())
    }
}

/// A registered user. Each account belongs to exactly one tenant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserAccount {
    pub id: UserId,
    pub tenant_id: TenantId,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
}

impl UserAccount {
    /// Create an account from validated credentials.
    pub fn register(credentials: &Credentials, tenant_id: TenantId, now: DateTime<Utc>) -> Result<Self, AuthError> {
        credentials.validate()?;
        Ok(Self {
            id: UserId::new(),
            tenant_id,
            email: credentials.normalized_email(),
            password_hash: hash_password(&credentials.password),
            created_at: now,
        })
    }

    pub fn verify(&self, password: &str) -> bool {
        verify_password(password, &self.password_hash)
    }

    pub fn claims(&self, now: DateTime<Utc>, ttl: Duration) -> JwtClaims {
        JwtClaims::new(self.id, self.email.clone(), self.tenant_id, now, ttl)
    }
}
