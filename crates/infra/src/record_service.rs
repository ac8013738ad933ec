//! Record operations shared by every catalog resource.
//!
//! Handlers call into this service with an already-resolved tenant and
//! resource definition; it validates payloads against the definition's
//! fields, applies lifecycle rules for status actions and persists through a
//! [`RecordStore`]. Concurrent writers are not coordinated: the last write
//! wins.

use chrono::Utc;
use serde_json::Value;

use keel_core::field::describe_errors;
use keel_core::{DomainError, Record, RecordId, ResourceDef, TenantId, ValidationMode, validate_fields};

use crate::store::{RecordStore, StoreError};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ServiceError {
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error(transparent)]
    Store(StoreError),
}

impl From<StoreError> for ServiceError {
    fn from(value: StoreError) -> Self {
        match value {
            StoreError::NotFound => ServiceError::Domain(DomainError::NotFound),
            StoreError::Conflict(msg) => ServiceError::Domain(DomainError::Conflict(msg)),
            other => ServiceError::Store(other),
        }
    }
}

#[derive(Debug, Clone)]
pub struct RecordService<S> {
    store: S,
}

impl<S: RecordStore> RecordService<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Validate and store a new record in the resource's initial status.
    pub async fn create(&self, tenant_id: TenantId, def: &ResourceDef, payload: &Value) -> Result<Record, ServiceError> {
        let fields = validate_fields(def.fields, payload, ValidationMode::Create)
            .map_err(|errs| DomainError::validation(describe_errors(&errs)))?;

        let record = Record::new(
            tenant_id,
            def.key(),
            def.initial_status().map(str::to_string),
            fields,
            Utc::now(),
        );
        let record = self.store.insert(record).await?;

        tracing::info!(tenant_id = %tenant_id, resource = %record.resource, id = %record.id, "record created");
        Ok(record)
    }

    pub async fn list(&self, tenant_id: TenantId, def: &ResourceDef) -> Result<Vec<Record>, ServiceError> {
        Ok(self.store.list(tenant_id, &def.key()).await?)
    }

    pub async fn get(&self, tenant_id: TenantId, def: &ResourceDef, id: RecordId) -> Result<Record, ServiceError> {
        self.store
            .get(tenant_id, &def.key(), id)
            .await?
            .ok_or(ServiceError::Domain(DomainError::NotFound))
    }

    /// Partial update. Only keys present in `payload` change.
    pub async fn patch(
        &self,
        tenant_id: TenantId,
        def: &ResourceDef,
        id: RecordId,
        payload: &Value,
    ) -> Result<Record, ServiceError> {
        let changes = validate_fields(def.fields, payload, ValidationMode::Patch)
            .map_err(|errs| DomainError::validation(describe_errors(&errs)))?;

        let mut record = self.get(tenant_id, def, id).await?;
        if changes.is_empty() {
            return Ok(record);
        }

        record.merge(changes, Utc::now());
        let record = self.store.update(record).await?;

        tracing::info!(tenant_id = %tenant_id, resource = %record.resource, id = %record.id, version = record.version, "record updated");
        Ok(record)
    }

    pub async fn delete(&self, tenant_id: TenantId, def: &ResourceDef, id: RecordId) -> Result<(), ServiceError> {
        let key = def.key();
        if !self.store.delete(tenant_id, &key, id).await? {
            return Err(DomainError::NotFound.into());
        }

        tracing::info!(tenant_id = %tenant_id, resource = %key, id = %id, "record deleted");
        Ok(())
    }

    /// Run a status action. Repeating an action that already produced the
    /// current status returns the record untouched.
    pub async fn transition(
        &self,
        tenant_id: TenantId,
        def: &ResourceDef,
        id: RecordId,
        action: &str,
    ) -> Result<Record, ServiceError> {
        let lifecycle = def.lifecycle.ok_or(DomainError::NotFound)?;
        // Unknown actions are rejected before touching storage.
        lifecycle.transition(action).ok_or(DomainError::NotFound)?;

        let mut record = self.get(tenant_id, def, id).await?;
        let from = record.status.clone();
        let target = lifecycle.apply(from.as_deref(), action)?;

        if from.as_deref() == Some(target) {
            tracing::debug!(resource = %record.resource, id = %id, action, "status action already applied");
            return Ok(record);
        }

        record.set_status(target, Utc::now());
        let record = self.store.update(record).await?;

        tracing::info!(
            tenant_id = %tenant_id,
            resource = %record.resource,
            id = %record.id,
            action,
            from = from.as_deref().unwrap_or("-"),
            to = target,
            "record status changed"
        );
        Ok(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use keel_core::Catalog;
    use serde_json::json;

    use crate::store::InMemoryRecordStore;

    fn service() -> RecordService<InMemoryRecordStore> {
        RecordService::new(InMemoryRecordStore::new())
    }

    fn invoices() -> ResourceDef {
        *Catalog::standard().find("ap", "invoices").unwrap()
    }

    fn invoice_payload() -> Value {
        json!({"vendor": "Acme", "invoice_number": "INV-1", "amount": "125.50"})
    }

    #[tokio::test]
    async fn create_then_list_returns_the_record() {
        let svc = service();
        let tenant = TenantId::new();
        let def = invoices();

        let created = svc.create(tenant, &def, &invoice_payload()).await.unwrap();
        assert_eq!(created.status.as_deref(), Some("Draft"));
        assert_eq!(created.fields["amount"], json!(125.5));

        let listed = svc.list(tenant, &def).await.unwrap();
        assert_eq!(listed, vec![created]);
    }

    #[tokio::test]
    async fn create_rejects_missing_required_fields() {
        let svc = service();
        let err = svc
            .create(TenantId::new(), &invoices(), &json!({"vendor": "Acme"}))
            .await
            .unwrap_err();
        assert_eq!(
            err,
            ServiceError::Domain(DomainError::validation(
                "invoice_number is required; amount is required"
            ))
        );
    }

    #[tokio::test]
    async fn delete_then_list_omits_the_record() {
        let svc = service();
        let tenant = TenantId::new();
        let def = invoices();
        let rec = svc.create(tenant, &def, &invoice_payload()).await.unwrap();

        svc.delete(tenant, &def, rec.id).await.unwrap();
        assert!(svc.list(tenant, &def).await.unwrap().is_empty());
        assert_eq!(
            svc.delete(tenant, &def, rec.id).await.unwrap_err(),
            ServiceError::Domain(DomainError::NotFound)
        );
    }

    #[tokio::test]
    async fn patch_merges_and_bumps_version() {
        let svc = service();
        let tenant = TenantId::new();
        let def = invoices();
        let rec = svc.create(tenant, &def, &invoice_payload()).await.unwrap();

        let updated = svc
            .patch(tenant, &def, rec.id, &json!({"amount": 99, "due_date": "2025-01-31"}))
            .await
            .unwrap();
        assert_eq!(updated.fields["amount"], json!(99.0));
        assert_eq!(updated.fields["due_date"], json!("2025-01-31"));
        assert_eq!(updated.fields["vendor"], json!("Acme"));
        assert_eq!(updated.version, 2);
    }

    #[tokio::test]
    async fn patch_cannot_set_status_directly() {
        let svc = service();
        let tenant = TenantId::new();
        let def = invoices();
        let rec = svc.create(tenant, &def, &invoice_payload()).await.unwrap();

        let err = svc
            .patch(tenant, &def, rec.id, &json!({"status": "Approved"}))
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Domain(DomainError::Validation(_))));
    }

    #[tokio::test]
    async fn transitions_follow_the_lifecycle() {
        let svc = service();
        let tenant = TenantId::new();
        let def = invoices();
        let rec = svc.create(tenant, &def, &invoice_payload()).await.unwrap();

        let err = svc.transition(tenant, &def, rec.id, "approve").await.unwrap_err();
        assert!(matches!(err, ServiceError::Domain(DomainError::InvalidTransition(_))));

        let submitted = svc.transition(tenant, &def, rec.id, "submit").await.unwrap();
        assert_eq!(submitted.status.as_deref(), Some("Submitted"));

        let approved = svc.transition(tenant, &def, rec.id, "approve").await.unwrap();
        assert_eq!(approved.status.as_deref(), Some("Approved"));
    }

    #[tokio::test]
    async fn repeated_transition_is_a_no_op() {
        let svc = service();
        let tenant = TenantId::new();
        let def = invoices();
        let rec = svc.create(tenant, &def, &invoice_payload()).await.unwrap();

        let first = svc.transition(tenant, &def, rec.id, "submit").await.unwrap();
        let second = svc.transition(tenant, &def, rec.id, "submit").await.unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn unknown_action_and_static_resources_are_not_found() {
        let svc = service();
        let tenant = TenantId::new();
        let def = invoices();
        let rec = svc.create(tenant, &def, &invoice_payload()).await.unwrap();
        assert_eq!(
            svc.transition(tenant, &def, rec.id, "shred").await.unwrap_err(),
            ServiceError::Domain(DomainError::NotFound)
        );

        let ledger_sets = *Catalog::standard().find("gl", "ledger-sets").unwrap();
        let set = svc
            .create(tenant, &ledger_sets, &json!({"name": "Primary", "currency": "USD"}))
            .await
            .unwrap();
        assert_eq!(set.status, None);
        assert_eq!(
            svc.transition(tenant, &ledger_sets, set.id, "approve").await.unwrap_err(),
            ServiceError::Domain(DomainError::NotFound)
        );
    }

    #[tokio::test]
    async fn records_are_invisible_to_other_tenants() {
        let svc = service();
        let def = invoices();
        let rec = svc.create(TenantId::new(), &def, &invoice_payload()).await.unwrap();

        let other = TenantId::new();
        assert_eq!(
            svc.get(other, &def, rec.id).await.unwrap_err(),
            ServiceError::Domain(DomainError::NotFound)
        );
        assert!(svc.list(other, &def).await.unwrap().is_empty());
    }
}
