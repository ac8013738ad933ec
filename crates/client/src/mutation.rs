//! Write requests that invalidate cache entries on success.

use std::sync::{Arc, Mutex, PoisonError};

use serde_json::Value;

use crate::cache::{Invalidate, QueryCache};
use crate::error::ClientError;
use crate::query::{ApiRequest, Method};

#[derive(Debug, Clone, PartialEq)]
pub enum MutationState {
    Idle,
    Pending,
    Success(Arc<Value>),
    Error(ClientError),
}

/// A create/update/delete/action request bound to its cache invalidations.
///
/// Failures are returned to the caller as-is: no retry, no rollback.
#[derive(Clone)]
pub struct Mutation {
    cache: QueryCache,
    method: Method,
    path: String,
    invalidates: Vec<Invalidate>,
    state: Arc<Mutex<MutationState>>,
}

impl Mutation {
    pub fn new(cache: &QueryCache, method: Method, path: impl Into<String>) -> Self {
        Self {
            cache: cache.clone(),
            method,
            path: path.into(),
            invalidates: Vec::new(),
            state: Arc::new(Mutex::new(MutationState::Idle)),
        }
    }

    /// Add an invalidation to run after every successful call.
    pub fn invalidates(mut self, target: Invalidate) -> Self {
        self.invalidates.push(target);
        self
    }

    pub fn method(&self) -> Method {
        self.method
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn state(&self) -> MutationState {
        self.state.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn is_pending(&self) -> bool {
        self.state() == MutationState::Pending
    }

    pub fn reset(&self) {
        self.set_state(MutationState::Idle);
    }

    fn set_state(&self, state: MutationState) {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner) = state;
    }

    /// Send `payload` (omitted when `null`) and return the response body.
    pub async fn mutate(&self, payload: Value) -> Result<Value, ClientError> {
        let mut request = ApiRequest::new(self.method, self.path.clone());
        if !payload.is_null() {
            request.body = Some(payload);
        }

        self.set_state(MutationState::Pending);
        match self.cache.transport().send(request).await {
            Ok(body) => {
                for target in &self.invalidates {
                    self.cache.invalidate(target);
                }
                self.set_state(MutationState::Success(Arc::new(body.clone())));
                tracing::debug!(method = self.method.as_str(), path = %self.path, "mutation succeeded");
                Ok(body)
            }
            Err(e) => {
                self.set_state(MutationState::Error(e.clone()));
                tracing::warn!(method = self.method.as_str(), path = %self.path, error = %e, "mutation failed");
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::CacheConfig;
    use crate::query::QueryKey;
    use crate::testing::MockTransport;
    use serde_json::json;

    #[tokio::test]
    async fn success_invalidates_targets() {
        let transport = Arc::new(MockTransport::new(|req, n| match req.method {
            Method::Get => Ok(json!({ "items": [], "n": n })),
            _ => Ok(json!({ "id": "1" })),
        }));
        let cache = QueryCache::new(transport.clone(), CacheConfig::default());
        let list = QueryKey::new("/api/ap/invoices");
        cache.query(&list).await.unwrap();

        let create = Mutation::new(&cache, Method::Post, "/api/ap/invoices")
            .invalidates(Invalidate::Prefix("/api/ap/invoices".into()));
        assert_eq!(create.state(), MutationState::Idle);

        let body = create.mutate(json!({ "vendor": "Acme" })).await.unwrap();
        assert_eq!(body, json!({ "id": "1" }));
        assert_eq!(create.state(), MutationState::Success(Arc::new(json!({ "id": "1" }))));
        assert_eq!(cache.is_stale(&list), Some(true));

        let requests = transport.requests();
        assert_eq!(requests[1].body, Some(json!({ "vendor": "Acme" })));
    }

    #[tokio::test]
    async fn failure_leaves_cache_alone_and_does_not_retry() {
        let transport = Arc::new(MockTransport::new(|req, _| match req.method {
            Method::Get => Ok(json!({ "items": [] })),
            _ => Err(ClientError::Network("connection refused".into())),
        }));
        let cache = QueryCache::new(transport.clone(), CacheConfig::default());
        let list = QueryKey::new("/api/ap/invoices");
        cache.query(&list).await.unwrap();

        let approve = Mutation::new(&cache, Method::Post, "/api/ap/invoices/1/approve")
            .invalidates(Invalidate::Exact(list.clone()));
        let err = approve.mutate(Value::Null).await.unwrap_err();

        assert_eq!(err, ClientError::Network("connection refused".into()));
        assert_eq!(approve.state(), MutationState::Error(err));
        assert_eq!(cache.is_stale(&list), Some(false));
        assert_eq!(transport.count(), 2);
        assert_eq!(transport.requests()[1].body, None);
    }
}
