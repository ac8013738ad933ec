//! Service wiring: storage backends, record service, token signing.

use std::sync::Arc;

use chrono::{Duration, Utc};

use keel_auth::{AuthError, Hs256Jwt, JwtIssuer, UserAccount};
use keel_core::Catalog;
use keel_infra::{
    InMemoryRecordStore, InMemoryUserStore, RecordService, RecordStore, SqliteStore, UserStore,
};

use crate::config::ApiConfig;

pub struct AppServices {
    pub catalog: Arc<Catalog>,
    pub records: RecordService<Arc<dyn RecordStore>>,
    pub users: Arc<dyn UserStore>,
    pub jwt: Arc<Hs256Jwt>,
    pub token_ttl: Duration,
}

impl AppServices {
    pub fn new(
        catalog: Catalog,
        records: Arc<dyn RecordStore>,
        users: Arc<dyn UserStore>,
        jwt_secret: &str,
        token_ttl: Duration,
    ) -> Self {
        Self {
            catalog: Arc::new(catalog),
            records: RecordService::new(records),
            users,
            jwt: Arc::new(Hs256Jwt::new(jwt_secret)),
            token_ttl,
        }
    }

    /// Standard catalog over in-memory stores.
    pub fn in_memory(jwt_secret: &str, token_ttl: Duration) -> Self {
        Self::new(
            Catalog::standard(),
            Arc::new(InMemoryRecordStore::new()),
            Arc::new(InMemoryUserStore::new()),
            jwt_secret,
            token_ttl,
        )
    }

    /// Sign a session token for an account.
    pub fn issue_token(&self, account: &UserAccount) -> Result<String, AuthError> {
        self.jwt.issue(&account.claims(Utc::now(), self.token_ttl))
    }
}

/// Build services for a configuration: SQLite when `DATABASE_URL` is set,
/// in-memory otherwise.
pub async fn build_services(config: &ApiConfig) -> anyhow::Result<AppServices> {
    match &config.database_url {
        Some(url) => {
            let store = Arc::new(SqliteStore::connect(url).await?);
            tracing::info!(database_url = %url, "using sqlite storage");
            Ok(AppServices::new(
                Catalog::standard(),
                store.clone(),
                store,
                &config.jwt_secret,
                config.token_ttl,
            ))
        }
        None => {
            tracing::info!("using in-memory storage");
            Ok(AppServices::in_memory(&config.jwt_secret, config.token_ttl))
        }
    }
}
