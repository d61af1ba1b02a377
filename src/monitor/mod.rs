// Inner modules
mod errors;
mod payload;
mod publisher;
mod transport;

use std::sync::Arc;

use prometheus::Registry;

use crate::config::EmitterConfig;
use crate::credentials::TokenCache;

// Exports
pub use errors::PublishError;
pub use publisher::MetricPublisher;
pub use transport::{HttpTransport, PublishOutcome};

#[cfg(test)]
pub(crate) use publisher::test::FakeTransport;

/// Create the [`MetricPublisher`] of the lag metric, submitting over HTTPS to Azure Monitor.
pub fn init(
    config: &EmitterConfig,
    http: reqwest::Client,
    tokens: Arc<TokenCache>,
    metrics: Arc<Registry>,
) -> MetricPublisher {
    let endpoint = config.metrics_endpoint();
    info!("Publishing metric of tenant '{}' to: {endpoint}", config.tenant_id);

    let transport = Arc::new(HttpTransport::new(http, endpoint));
    let publisher = MetricPublisher::new(config.event_hub.clone(), tokens, transport, metrics);

    debug!("Initialized");
    publisher
}
