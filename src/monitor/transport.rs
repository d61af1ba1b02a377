use async_trait::async_trait;
use reqwest::header::{ACCEPT, CONTENT_TYPE};

use super::errors::{PublishError, PublishResult};

/// Response to a submitted payload, passed on unmodified.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishOutcome {
    pub status: u16,
    pub body: String,
}

impl PublishOutcome {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Submits serialized metric payloads to the monitoring backend.
#[async_trait]
pub trait MetricTransport: Send + Sync {
    /// Submit `body` (JSON), authenticated with `bearer_token`. Never retries.
    async fn submit(&self, bearer_token: &str, body: String) -> PublishResult<PublishOutcome>;
}

/// [`MetricTransport`] over HTTPS, to the regional Azure Monitor metrics endpoint.
pub struct HttpTransport {
    http: reqwest::Client,
    endpoint: String,
}

impl HttpTransport {
    pub fn new(http: reqwest::Client, endpoint: String) -> Self {
        Self {
            http,
            endpoint,
        }
    }
}

#[async_trait]
impl MetricTransport for HttpTransport {
    async fn submit(&self, bearer_token: &str, body: String) -> PublishResult<PublishOutcome> {
        trace!("POST {}: {body}", self.endpoint);

        let res = self
            .http
            .post(&self.endpoint)
            .bearer_auth(bearer_token)
            .header(ACCEPT, "application/json")
            .header(CONTENT_TYPE, "application/json")
            .body(body)
            .send()
            .await
            .map_err(|e| PublishError::Transport(self.endpoint.clone(), e))?;

        let status = res.status().as_u16();
        let body = res.text().await.map_err(|e| PublishError::Transport(self.endpoint.clone(), e))?;

        Ok(PublishOutcome {
            status,
            body,
        })
    }
}
