//! Sending [`ApiRequest`]s and holding the session token.

use std::sync::{Arc, PoisonError, RwLock};

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Value, json};

use crate::error::ClientError;
use crate::query::{ApiRequest, Method};

#[async_trait]
pub trait Transport: Send + Sync {
    /// Send a request and return the decoded JSON body (`null` for empty bodies).
    async fn send(&self, request: ApiRequest) -> Result<Value, ClientError>;
}

#[async_trait]
impl<T> Transport for Arc<T>
where
    T: Transport + ?Sized,
{
    async fn send(&self, request: ApiRequest) -> Result<Value, ClientError> {
        (**self).send(request).await
    }
}

/// Signed-in session returned by signup and login.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Session {
    pub token: String,
    pub user: SessionUser,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SessionUser {
    pub id: String,
    pub email: String,
    pub tenant_id: String,
}

/// `reqwest`-backed transport. Clones share the session token.
#[derive(Clone)]
pub struct HttpTransport {
    base_url: String,
    http: reqwest::Client,
    token: Arc<RwLock<Option<String>>>,
}

impl core::fmt::Debug for HttpTransport {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("HttpTransport")
            .field("base_url", &self.base_url)
            .field("signed_in", &self.token().is_some())
            .finish()
    }
}

impl HttpTransport {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            http: reqwest::Client::new(),
            token: Arc::new(RwLock::new(None)),
        }
    }

    pub fn with_token(base_url: impl Into<String>, token: impl Into<String>) -> Self {
        let transport = Self::new(base_url);
        transport.set_token(Some(token.into()));
        transport
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn token(&self) -> Option<String> {
        self.token.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn set_token(&self, token: Option<String>) {
        *self.token.write().unwrap_or_else(PoisonError::into_inner) = token;
    }

    pub async fn signup(&self, email: &str, password: &str) -> Result<Session, ClientError> {
        self.start_session("/api/auth/signup", email, password).await
    }

    pub async fn login(&self, email: &str, password: &str) -> Result<Session, ClientError> {
        self.start_session("/api/auth/login", email, password).await
    }

    /// Forget the session token. Tokens are stateless, so nothing is sent.
    pub fn logout(&self) {
        self.set_token(None);
    }

    async fn start_session(&self, path: &str, email: &str, password: &str) -> Result<Session, ClientError> {
        let body = self
            .send(ApiRequest::post(path, json!({ "email": email, "password": password })))
            .await?;
        let session: Session = serde_json::from_value(body).map_err(|e| ClientError::Decode(e.to_string()))?;

        self.set_token(Some(session.token.clone()));
        tracing::info!(user_id = %session.user.id, "session started");
        Ok(session)
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, request: ApiRequest) -> Result<Value, ClientError> {
        let method = match request.method {
            Method::Get => reqwest::Method::GET,
            Method::Post => reqwest::Method::POST,
            Method::Patch => reqwest::Method::PATCH,
            Method::Delete => reqwest::Method::DELETE,
        };
        let url = format!("{}{}", self.base_url, request.path);

        let mut req = self.http.request(method, &url);
        if !request.query.is_empty() {
            req = req.query(&request.query);
        }
        if let Some(token) = self.token() {
            req = req.bearer_auth(token);
        }
        if let Some(body) = &request.body {
            req = req.json(body);
        }

        let resp = req.send().await.map_err(|e| ClientError::Network(e.to_string()))?;
        let status = resp.status().as_u16();
        let bytes = resp.bytes().await.map_err(|e| ClientError::Network(e.to_string()))?;

        tracing::debug!(method = request.method.as_str(), path = %request.path, status, "api request");
        decode_response(status, &bytes)
    }
}

/// Map an HTTP status and body onto the client's result type.
pub(crate) fn decode_response(status: u16, body: &[u8]) -> Result<Value, ClientError> {
    if status == 401 {
        return Err(ClientError::Unauthorized);
    }

    if (200..300).contains(&status) {
        if status == 204 || body.is_empty() {
            return Ok(Value::Null);
        }
        return serde_json::from_slice(body).map_err(|e| ClientError::Decode(e.to_string()));
    }

    let parsed: Value = serde_json::from_slice(body).unwrap_or(Value::Null);
    let code = parsed
        .get("error")
        .and_then(Value::as_str)
        .unwrap_or("http_error")
        .to_string();
    let message = parsed
        .get("message")
        .and_then(Value::as_str)
        .map(str::to_string)
        .unwrap_or_else(|| String::from_utf8_lossy(body).into_owned());

    Err(ClientError::Http { status, code, message })
}
