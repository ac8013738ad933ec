//! HS256 token signing and verification.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};

use crate::claims::{JwtClaims, TokenValidationError, validate_claims};
use crate::AuthError;

/// Verifies a bearer token and returns its claims.
pub trait JwtValidator: Send + Sync {
    fn validate(&self, token: &str, now: DateTime<Utc>) -> Result<JwtClaims, AuthError>;
}

/// Signs claims into a bearer token.
pub trait JwtIssuer: Send + Sync {
    fn issue(&self, claims: &JwtClaims) -> Result<String, AuthError>;
}

/// Shared-secret HS256 signer/verifier.
#[derive(Clone)]
pub struct Hs256Jwt {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
}

impl Hs256Jwt {
    pub fn new(secret: impl AsRef<[u8]>) -> Self {
        let secret = secret.as_ref();

        // Expiry is checked by `validate_claims` against an injected clock.
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = false;
        validation.required_spec_claims = HashSet::new();

        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            validation,
        }
    }
}

impl core::fmt::Debug for Hs256Jwt {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Hs256Jwt").finish_non_exhaustive()
    }
}

impl JwtValidator for Hs256Jwt {
    fn validate(&self, token: &str, now: DateTime<Utc>) -> Result<JwtClaims, AuthError> {
        let data = decode::<JwtClaims>(token, &self.decoding, &self.validation)
            .map_err(|e| TokenValidationError::Malformed(e.to_string()))?;
        validate_claims(&data.claims, now)?;
        Ok(data.claims)
    }
}

impl JwtIssuer for Hs256Jwt {
    fn issue(&self, claims: &JwtClaims) -> Result<String, AuthError> {
        encode(&Header::new(Algorithm::HS256), claims, &self.encoding)
            .map_err(|e| AuthError::Encoding(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use keel_core::{TenantId, UserId};

    fn claims(now: DateTime<Utc>) -> JwtClaims {
        JwtClaims::new(UserId::new(), "ops@example.com", TenantId::new(), now, Duration::hours(1))
    }

    #[test]
    fn issued_tokens_validate() {
        let jwt = Hs256Jwt::new("secret");
        let now = Utc::now();
        let c = claims(now);
        let token = jwt.issue(&c).unwrap();

        let decoded = jwt.validate(&token, now + Duration::seconds(1)).unwrap();
        assert_eq!(decoded.sub, c.sub);
        assert_eq!(decoded.tenant_id, c.tenant_id);
        assert_eq!(decoded.email, c.email);
    }

    #[test]
    fn wrong_secret_is_rejected() {
        let now = Utc::now();
        let token = Hs256Jwt::new("secret").issue(&claims(now)).unwrap();
        let err = Hs256Jwt::new("other").validate(&token, now).unwrap_err();
        assert!(matches!(err, AuthError::Token(TokenValidationError::Malformed(_))));
    }

    #[test]
    fn expired_tokens_are_rejected() {
        let jwt = Hs256Jwt::new("secret");
        let now = Utc::now();
        let token = jwt.issue(&claims(now)).unwrap();
        let err = jwt.validate(&token, now + Duration::hours(2)).unwrap_err();
        assert_eq!(err, AuthError::Token(TokenValidationError::Expired));
    }

    #[test]
    fn garbage_is_rejected() {
        let err = Hs256Jwt::new("secret").validate("not.a.token", Utc::now()).unwrap_err();
        assert!(matches!(err, AuthError::Token(TokenValidationError::Malformed(_))));
    }
}
