//! List screen view model.

use serde_json::Value;

use crate::cache::{CacheEvent, QueryCache, QueryObserver};
use crate::error::ClientError;
use crate::query::QueryKey;

/// Rows of one collection endpoint, kept in sync with the cache.
///
/// Holding a `ResourceList` keeps its cache entry alive; dropping it is the
/// equivalent of unmounting the screen.
pub struct ResourceList {
    observer: QueryObserver,
    items: Vec<Value>,
    error: Option<ClientError>,
}

impl ResourceList {
    pub fn new(cache: &QueryCache, key: QueryKey) -> Self {
        Self {
            observer: cache.observe(key),
            items: Vec::new(),
            error: None,
        }
    }

    pub fn key(&self) -> &QueryKey {
        self.observer.key()
    }

    /// Fetch (or reuse) the collection and refresh `items`.
    pub async fn load(&mut self) -> Result<&[Value], ClientError> {
        match self.observer.query().await {
            Ok(body) => {
                self.items = body
                    .get("items")
                    .and_then(Value::as_array)
                    .cloned()
                    .unwrap_or_default();
                self.error = None;
                Ok(&self.items)
            }
            Err(e) => {
                self.error = Some(e.clone());
                Err(e)
            }
        }
    }

    pub fn items(&self) -> &[Value] {
        &self.items
    }

    pub fn error(&self) -> Option<&ClientError> {
        self.error.as_ref()
    }

    pub fn find(&self, id: &str) -> Option<&Value> {
        self.items.iter().find(|item| item.get("id").and_then(Value::as_str) == Some(id))
    }

    /// Wait until the collection is invalidated or replaced, then reload.
    /// Returns `None` if the cache went away.
    pub async fn wait_for_change(&mut self) -> Option<Result<&[Value], ClientError>> {
        loop {
            match self.observer.changed().await? {
                CacheEvent::Invalidated(_) | CacheEvent::Updated(_) => break,
                CacheEvent::Removed(_) => {}
            }
        }
        Some(self.load().await)
    }
}
