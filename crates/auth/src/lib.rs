//! `keel-auth` is the authentication boundary: token claims, signing, passwords,
//! and user accounts.
//!
//! This crate is decoupled from HTTP and storage.

pub mod claims;
pub mod jwt;
pub mod password;
pub mod user;

pub use claims::{JwtClaims, TokenValidationError, validate_claims};
pub use jwt::{Hs256Jwt, JwtIssuer, JwtValidator};
pub use password::{hash_password, reject_unknown_account, verify_password};
pub use user::{Credentials, UserAccount};

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthError {
    /// Unknown e-mail or wrong password (deliberately indistinguishable).
    #[error("invalid email or password")]
    InvalidCredentials,

    #[error("invalid token: {0}")]
    Token(#[from] TokenValidationError),

    #[error("failed to encode token: {0}")]
    Encoding(String),

    /// Credentials that could never be valid (bad e-mail shape, short password).
    #[error("{0}")]
    Validation(String),
}
