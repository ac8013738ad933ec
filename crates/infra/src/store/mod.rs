//! Tenant-isolated storage abstractions.
//!
//! Every call carries the tenant; implementations must never return or
//! mutate a record owned by another tenant.

use std::sync::Arc;

use async_trait::async_trait;

use keel_auth::UserAccount;
use keel_core::{Record, RecordId, TenantId};

pub mod memory;
pub mod sqlite;

pub use memory::{InMemoryRecordStore, InMemoryUserStore};
pub use sqlite::SqliteStore;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    #[error("record not found")]
    NotFound,
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("storage error: {0}")]
    Storage(String),
}

impl From<sqlx::Error> for StoreError {
    fn from(value: sqlx::Error) -> Self {
        match value {
            sqlx::Error::RowNotFound => StoreError::NotFound,
            other => StoreError::Storage(other.to_string()),
        }
    }
}

/// Record persistence, scoped by tenant and resource key (`module/name`).
#[async_trait]
pub trait RecordStore: Send + Sync {
    async fn insert(&self, record: Record) -> Result<Record, StoreError>;

    async fn get(&self, tenant_id: TenantId, resource: &str, id: RecordId) -> Result<Option<Record>, StoreError>;

    /// All records of a resource, oldest first.
    async fn list(&self, tenant_id: TenantId, resource: &str) -> Result<Vec<Record>, StoreError>;

    /// Replace an existing record. `NotFound` if it was deleted meanwhile.
    async fn update(&self, record: Record) -> Result<Record, StoreError>;

    /// Returns `false` when nothing was deleted.
    async fn delete(&self, tenant_id: TenantId, resource: &str, id: RecordId) -> Result<bool, StoreError>;
}

/// User account persistence. E-mails are unique across tenants.
#[async_trait]
pub trait UserStore: Send + Sync {
    /// `Conflict` if the e-mail is already registered.
    async fn create(&self, account: UserAccount) -> Result<UserAccount, StoreError>;

    async fn find_by_email(&self, email: &str) -> Result<Option<UserAccount>, StoreError>;
}

#[async_trait]
impl<S> RecordStore for Arc<S>
where
    S: RecordStore + ?Sized,
{
    async fn insert(&self, record: Record) -> Result<Record, StoreError> {
        (**self).insert(record).await
    }

    async fn get(&self, tenant_id: TenantId, resource: &str, id: RecordId) -> Result<Option<Record>, StoreError> {
        (**self).get(tenant_id, resource, id).await
    }

    async fn list(&self, tenant_id: TenantId, resource: &str) -> Result<Vec<Record>, StoreError> {
        (**self).list(tenant_id, resource).await
    }

    async fn update(&self, record: Record) -> Result<Record, StoreError> {
        (**self).update(record).await
    }

    async fn delete(&self, tenant_id: TenantId, resource: &str, id: RecordId) -> Result<bool, StoreError> {
        (**self).delete(tenant_id, resource, id).await
    }
}

#[async_trait]
impl<S> UserStore for Arc<S>
where
    S: UserStore + ?Sized,
{
    async fn create(&self, account: UserAccount) -> Result<UserAccount, StoreError> {
        (**self).create(account).await
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<UserAccount>, StoreError> {
        (**self).find_by_email(email).await
    }
}
