//! In-memory stores for tests and single-process development.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;

use keel_auth::UserAccount;
use keel_core::{Record, RecordId, TenantId};

use super::{RecordStore, StoreError, UserStore};

type RecordKey = (TenantId, String, RecordId);

fn poisoned() -> StoreError {
    StoreError::Storage("lock poisoned".into())
}

#[derive(Debug, Default)]
pub struct InMemoryRecordStore {
    inner: RwLock<HashMap<RecordKey, Record>>,
}

impl InMemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn key_of(record: &Record) -> RecordKey {
    (record.tenant_id, record.resource.clone(), record.id)
}

#[async_trait]
impl RecordStore for InMemoryRecordStore {
    async fn insert(&self, record: Record) -> Result<Record, StoreError> {
        let mut map = self.inner.write().map_err(|_| poisoned())?;
        let key = key_of(&record);
        if map.contains_key(&key) {
            return Err(StoreError::Conflict(format!("record {} already exists", record.id)));
        }
        map.insert(key, record.clone());
        Ok(record)
    }

    async fn get(&self, tenant_id: TenantId, resource: &str, id: RecordId) -> Result<Option<Record>, StoreError> {
        let map = self.inner.read().map_err(|_| poisoned())?;
        Ok(map.get(&(tenant_id, resource.to_string(), id)).cloned())
    }

    async fn list(&self, tenant_id: TenantId, resource: &str) -> Result<Vec<Record>, StoreError> {
        let map = self.inner.read().map_err(|_| poisoned())?;
        let mut out: Vec<Record> = map
            .iter()
            .filter(|((t, r, _), _)| *t == tenant_id && r == resource)
            .map(|(_, v)| v.clone())
            .collect();
        out.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(out)
    }

    async fn update(&self, record: Record) -> Result<Record, StoreError> {
        let mut map = self.inner.write().map_err(|_| poisoned())?;
        match map.get_mut(&key_of(&record)) {
            Some(slot) => {
                *slot = record.clone();
                Ok(record)
            }
            None => Err(StoreError::NotFound),
        }
    }

    async fn delete(&self, tenant_id: TenantId, resource: &str, id: RecordId) -> Result<bool, StoreError> {
        let mut map = self.inner.write().map_err(|_| poisoned())?;
        Ok(map.remove(&(tenant_id, resource.to_string(), id)).is_some())
    }
}

#[derive(Debug, Default)]
pub struct InMemoryUserStore {
    by_email: RwLock<HashMap<String, UserAccount>>,
}

impl InMemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UserStore for InMemoryUserStore {
    async fn create(&self, account: UserAccount) -> Result<UserAccount, StoreError> {
        let mut map = self.by_email.write().map_err(|_| poisoned())?;
        if map.contains_key(&account.email) {
            return Err(StoreError::Conflict(format!("{} is already registered", account.email)));
        }
        map.insert(account.email.clone(), account.clone());
        Ok(account)
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<UserAccount>, StoreError> {
        let map = self.by_email.read().map_err(|_| poisoned())?;
        Ok(map.get(email).cloned())
    }
}
