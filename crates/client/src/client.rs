//! High-level entry point tying transport, cache and catalog together.

use std::fmt::Display;
use std::sync::Arc;

use serde_json::Value;

use keel_core::{Catalog, ResourceDef};

use crate::cache::{CacheConfig, Invalidate, QueryCache};
use crate::error::ClientError;
use crate::form::{FormState, LineItemsForm};
use crate::list::ResourceList;
use crate::mutation::Mutation;
use crate::query::{Method, QueryKey};
use crate::transport::{HttpTransport, Session};

#[derive(Clone)]
pub struct ApiClient {
    transport: HttpTransport,
    cache: QueryCache,
    catalog: Arc<Catalog>,
}

impl ApiClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_config(base_url, CacheConfig::default())
    }

    pub fn with_config(base_url: impl Into<String>, config: CacheConfig) -> Self {
        let transport = HttpTransport::new(base_url);
        let cache = QueryCache::new(Arc::new(transport.clone()), config);
        Self {
            transport,
            cache,
            catalog: Arc::new(Catalog::standard()),
        }
    }

    pub fn transport(&self) -> &HttpTransport {
        &self.transport
    }

    pub fn cache(&self) -> &QueryCache {
        &self.cache
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn resource(&self, module: &str, name: &str) -> Option<ResourceDef> {
        self.catalog.find(module, name).copied()
    }

    pub async fn signup(&self, email: &str, password: &str) -> Result<Session, ClientError> {
        let session = self.transport.signup(email, password).await?;
        self.cache.clear();
        Ok(session)
    }

    pub async fn login(&self, email: &str, password: &str) -> Result<Session, ClientError> {
        let session = self.transport.login(email, password).await?;
        self.cache.clear();
        Ok(session)
    }

    /// Drop the token and everything cached under it.
    pub fn logout(&self) {
        self.transport.logout();
        self.cache.clear();
    }

    pub fn collection_key(def: &ResourceDef) -> QueryKey {
        QueryKey::new(def.collection_path())
    }

    pub async fn list(&self, def: &ResourceDef) -> Result<Vec<Value>, ClientError> {
        let body = self.cache.query(&Self::collection_key(def)).await?;
        Ok(body
            .get("items")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default())
    }

    pub async fn get(&self, def: &ResourceDef, id: impl Display) -> Result<Value, ClientError> {
        let body = self.cache.query(&QueryKey::new(def.item_path(id))).await?;
        Ok(Value::clone(&body))
    }

    pub fn create(&self, def: &ResourceDef) -> Mutation {
        self.mutation(def, Method::Post, def.collection_path())
    }

    pub fn update(&self, def: &ResourceDef, id: impl Display) -> Mutation {
        self.mutation(def, Method::Patch, def.item_path(id))
    }

    pub fn delete(&self, def: &ResourceDef, id: impl Display) -> Mutation {
        self.mutation(def, Method::Delete, def.item_path(id))
    }

    pub fn transition(&self, def: &ResourceDef, id: impl Display, action: &str) -> Mutation {
        self.mutation(def, Method::Post, def.action_path(id, action))
    }

    // Every write invalidates the collection and any item under it.
    fn mutation(&self, def: &ResourceDef, method: Method, path: String) -> Mutation {
        Mutation::new(&self.cache, method, path).invalidates(Invalidate::Prefix(def.collection_path()))
    }

    pub fn list_view(&self, def: &ResourceDef) -> ResourceList {
        ResourceList::new(&self.cache, Self::collection_key(def))
    }

    pub fn form(&self, def: &ResourceDef) -> FormState {
        FormState::new(def.fields).with_success_message(format!("{} saved", def.label))
    }

    pub fn edit_form(&self, def: &ResourceDef, record: &Value) -> FormState {
        FormState::for_record(def.fields, record).with_success_message(format!("{} updated", def.label))
    }

    pub fn line_items(&self, def: &ResourceDef, amount_field: &'static str) -> LineItemsForm {
        LineItemsForm::new(def.fields, amount_field)
    }
}
