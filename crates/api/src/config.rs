//! Server configuration, read once from the environment at startup.

use std::net::SocketAddr;

use anyhow::Context;
use chrono::Duration;

const DEFAULT_BIND: &str = "0.0.0.0:8080";
const DEFAULT_TOKEN_TTL_SECS: i64 = 24 * 60 * 60;
const DEV_JWT_SECRET: &str = "dev-secret";

#[derive(Clone)]
pub struct ApiConfig {
    pub bind_addr: SocketAddr,
    pub jwt_secret: String,
    pub token_ttl: Duration,
    /// `sqlite:` URL; in-memory storage when unset.
    pub database_url: Option<String>,
}

impl core::fmt::Debug for ApiConfig {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("ApiConfig")
            .field("bind_addr", &self.bind_addr)
            .field("jwt_secret", &"<redacted>")
            .field("token_ttl", &self.token_ttl)
            .field("database_url", &self.database_url)
            .finish()
    }
}

impl ApiConfig {
    /// Read `KEEL_BIND`, `JWT_SECRET`, `KEEL_TOKEN_TTL_SECS` and `DATABASE_URL`.
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let bind = lookup("KEEL_BIND").unwrap_or_else(|| DEFAULT_BIND.to_string());
        let bind_addr = bind
            .parse::<SocketAddr>()
            .with_context(|| format!("KEEL_BIND is not a socket address: {bind}"))?;

        let jwt_secret = match lookup("JWT_SECRET").filter(|s| !s.is_empty()) {
            Some(secret) => secret,
            None => {
                tracing::warn!("JWT_SECRET not set; using insecure dev default");
                DEV_JWT_SECRET.to_string()
            }
        };

        let token_ttl = match lookup("KEEL_TOKEN_TTL_SECS") {
            Some(raw) => {
                let secs = raw
                    .parse::<i64>()
                    .with_context(|| format!("KEEL_TOKEN_TTL_SECS is not a number: {raw}"))?;
                anyhow::ensure!(secs > 0, "KEEL_TOKEN_TTL_SECS must be positive");
                Duration::seconds(secs)
            }
            None => Duration::seconds(DEFAULT_TOKEN_TTL_SECS),
        };

        let database_url = lookup("DATABASE_URL").filter(|s| !s.is_empty());

        Ok(Self {
            bind_addr,
            jwt_secret,
            token_ttl,
            database_url,
        })
    }

    /// In-memory configuration on an ephemeral local port.
    pub fn ephemeral(jwt_secret: impl Into<String>) -> Self {
        Self {
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 0)),
            jwt_secret: jwt_secret.into(),
            token_ttl: Duration::seconds(DEFAULT_TOKEN_TTL_SECS),
            database_url: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_apply_when_unset() {
        let cfg = ApiConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(cfg.bind_addr.port(), 8080);
        assert_eq!(cfg.jwt_secret, DEV_JWT_SECRET);
        assert_eq!(cfg.token_ttl, Duration::hours(24));
        assert!(cfg.database_url.is_none());
    }

    #[test]
    fn values_are_read_from_the_environment() {
        let cfg = ApiConfig::from_lookup(lookup(&[
            ("KEEL_BIND", "127.0.0.1:9000"),
            ("JWT_SECRET", "s3cret"),
            ("KEEL_TOKEN_TTL_SECS", "60"),
            ("DATABASE_URL", "sqlite://keel.db"),
        ]))
        .unwrap();
        assert_eq!(cfg.bind_addr.to_string(), "127.0.0.1:9000");
        assert_eq!(cfg.jwt_secret, "s3cret");
        assert_eq!(cfg.token_ttl, Duration::seconds(60));
        assert_eq!(cfg.database_url.as_deref(), Some("sqlite://keel.db"));
    }

    #[test]
    fn bad_values_are_errors() {
        assert!(ApiConfig::from_lookup(lookup(&[("KEEL_BIND", "nope")])).is_err());
        assert!(ApiConfig::from_lookup(lookup(&[("KEEL_TOKEN_TTL_SECS", "-5")])).is_err());
    }

    #[test]
    fn debug_redacts_the_secret() {
        let cfg = ApiConfig::ephemeral("top-secret");
        assert!(!format!("{cfg:?}").contains("top-secret"));
    }
}
