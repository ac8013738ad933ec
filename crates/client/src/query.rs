//! Request descriptors and cache keys.

use std::collections::BTreeMap;
use std::fmt;

use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Post,
    Patch,
    Delete,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Patch => "PATCH",
            Method::Delete => "DELETE",
        }
    }
}

/// A request to the API, independent of how it is sent.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiRequest {
    pub method: Method,
    pub path: String,
    pub query: Vec<(String, String)>,
    pub body: Option<Value>,
}

impl ApiRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: Vec::new(),
            body: None,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::Get, path)
    }

    pub fn post(path: impl Into<String>, body: Value) -> Self {
        Self::new(Method::Post, path).with_body(body)
    }

    pub fn with_body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }
}

/// Identity of a cached server response: a path plus optional parameters.
///
/// Parameters are kept sorted, so keys built from equal values compare
/// equal regardless of insertion order.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct QueryKey {
    path: String,
    params: BTreeMap<String, String>,
}

impl QueryKey {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            params: BTreeMap::new(),
        }
    }

    pub fn with_param(mut self, name: impl Into<String>, value: impl ToString) -> Self {
        self.params.insert(name.into(), value.to_string());
        self
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn params(&self) -> &BTreeMap<String, String> {
        &self.params
    }

    /// True when this key's path is `prefix` or lies below it.
    pub fn is_under(&self, prefix: &str) -> bool {
        let prefix = prefix.trim_end_matches('/');
        match self.path.strip_prefix(prefix) {
            Some(rest) => rest.is_empty() || rest.starts_with('/'),
            None => false,
        }
    }

    pub fn to_request(&self) -> ApiRequest {
        let mut req = ApiRequest::get(self.path.clone());
        req.query = self
            .params
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        req
    }
}

impl fmt::Display for QueryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.path)?;
        for (i, (k, v)) in self.params.iter().enumerate() {
            let sep = if i == 0 { '?' } else { '&' };
            write!(f, "{sep}{k}={v}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parameter_order_does_not_matter() {
        let a = QueryKey::new("/api/ap/invoices")
            .with_param("status", "Draft")
            .with_param("vendor", "Acme");
        let b = QueryKey::new("/api/ap/invoices")
            .with_param("vendor", "Acme")
            .with_param("status", "Draft");
        assert_eq!(a, b);
        assert_eq!(a.to_string(), "/api/ap/invoices?status=Draft&vendor=Acme");
    }

    #[test]
    fn prefix_matching_respects_segments() {
        let item = QueryKey::new("/api/ap/invoices/123");
        assert!(item.is_under("/api/ap/invoices"));
        assert!(item.is_under("/api/ap/invoices/"));
        assert!(!item.is_under("/api/ap/invoice"));
        assert!(QueryKey::new("/api/ap/invoices").is_under("/api/ap/invoices"));
    }

    #[test]
    fn request_carries_params() {
        let req = QueryKey::new("/api/crm/leads").with_param("page", 2).to_request();
        assert_eq!(req.method, Method::Get);
        assert_eq!(req.query, vec![("page".to_string(), "2".to_string())]);
        assert_eq!(req.body, None);
    }
}
