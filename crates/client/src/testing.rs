//! Scripted transport for unit tests.

use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::ClientError;
use crate::query::ApiRequest;
use crate::transport::Transport;

type Handler = Box<dyn Fn(&ApiRequest, usize) -> Result<Value, ClientError> + Send + Sync>;

pub(crate) struct MockTransport {
    requests: Mutex<Vec<ApiRequest>>,
    handler: Handler,
    delay: Duration,
}

impl MockTransport {
    /// `handler` receives each request and its zero-based call number.
    pub(crate) fn new(
        handler: impl Fn(&ApiRequest, usize) -> Result<Value, ClientError> + Send + Sync + 'static,
    ) -> Self {
        Self {
            requests: Mutex::new(Vec::new()),
            handler: Box::new(handler),
            delay: Duration::ZERO,
        }
    }

    pub(crate) fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub(crate) fn requests(&self) -> Vec<ApiRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub(crate) fn count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn send(&self, request: ApiRequest) -> Result<Value, ClientError> {
        let n = {
            let mut requests = self.requests.lock().unwrap();
            requests.push(request.clone());
            requests.len() - 1
        };
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        (self.handler)(&request, n)
    }
}
