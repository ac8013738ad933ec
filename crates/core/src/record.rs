//! The stored shape of every resource: scalar fields plus bookkeeping.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::id::{RecordId, TenantId};

/// A tenant-owned record of some catalog resource.
///
/// Records are plain data; which fields they carry is decided by the
/// resource's field definitions at validation time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub id: RecordId,
    pub tenant_id: TenantId,
    /// Catalog key, `module/name`.
    pub resource: String,
    pub status: Option<String>,
    pub fields: Map<String, Value>,
    pub version: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Record {
    pub fn new(
        tenant_id: TenantId,
        resource: impl Into<String>,
        status: Option<String>,
        fields: Map<String, Value>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: RecordId::new(),
            tenant_id,
            resource: resource.into(),
            status,
            fields,
            version: 1,
            created_at: now,
            updated_at: now,
        }
    }

    /// Apply a validated partial update. `null` values remove the key.
    pub fn merge(&mut self, changes: Map<String, Value>, now: DateTime<Utc>) {
        for (key, value) in changes {
            if value.is_null() {
                self.fields.remove(&key);
            } else {
                self.fields.insert(key, value);
            }
        }
        self.touch(now);
    }

    /// Move to a new status, bumping the version.
    pub fn set_status(&mut self, status: impl Into<String>, now: DateTime<Utc>) {
        self.status = Some(status.into());
        self.touch(now);
    }

    fn touch(&mut self, now: DateTime<Utc>) {
        self.version += 1;
        self.updated_at = now;
    }

    /// Wire representation: fields flattened next to the bookkeeping keys.
    pub fn to_json(&self) -> Value {
        let mut obj = self.fields.clone();
        obj.insert("id".into(), Value::String(self.id.to_string()));
        obj.insert(
            "status".into(),
            self.status.clone().map(Value::String).unwrap_or(Value::Null),
        );
        obj.insert("version".into(), Value::from(self.version));
        obj.insert("created_at".into(), Value::String(self.created_at.to_rfc3339()));
        obj.insert("updated_at".into(), Value::String(self.updated_at.to_rfc3339()));
        Value::Object(obj)
    }
}
