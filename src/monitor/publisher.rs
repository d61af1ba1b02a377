use std::sync::Arc;

use chrono::Utc;
use prometheus::{
    register_histogram_with_registry, register_int_gauge_with_registry, Histogram, IntGauge, Registry,
};

use super::errors::PublishResult;
use super::payload::MetricPayload;
use super::transport::{MetricTransport, PublishOutcome};
use crate::constants::MONITOR_SCOPE;
use crate::credentials::TokenCache;
use crate::lag::LagRecord;

const MET_PUBLISH_NAME: &str = "metric_publish_time_seconds";
const MET_PUBLISH_HELP: &str = "Time (s) taken to submit the lag metric payload";
const MET_STATUS_NAME: &str = "metric_publish_last_status";
const MET_STATUS_HELP: &str = "HTTP status of the latest lag metric submission";

/// Publishes the lag of each poll cycle as a custom metric.
pub struct MetricPublisher {
    event_hub: String,
    tokens: Arc<TokenCache>,
    transport: Arc<dyn MetricTransport>,

    // Prometheus Metrics
    metric_publish: Histogram,
    metric_status: IntGauge,
}

impl MetricPublisher {
    /// Create a new [`MetricPublisher`].
    ///
    /// # Arguments
    ///
    /// * `event_hub` - Name of the monitored Event Hub
    /// * `tokens` - Source of the bearer token for the monitor scope
    /// * `transport` - Where payloads are submitted
    /// * `metrics` - Registry to register the publisher metrics with
    pub fn new(
        event_hub: String,
        tokens: Arc<TokenCache>,
        transport: Arc<dyn MetricTransport>,
        metrics: Arc<Registry>,
    ) -> Self {
        Self {
            event_hub,
            tokens,
            transport,
            metric_publish: register_histogram_with_registry!(MET_PUBLISH_NAME, MET_PUBLISH_HELP, metrics)
                .unwrap_or_else(|e| panic!("Failed to create metric '{MET_PUBLISH_NAME}': {e}")),
            metric_status: register_int_gauge_with_registry!(MET_STATUS_NAME, MET_STATUS_HELP, metrics)
                .unwrap_or_else(|e| panic!("Failed to create metric '{MET_STATUS_NAME}': {e}")),
        }
    }

    /// Build the payload for `records` and submit it, once.
    ///
    /// The status of the response is returned as is, even when not a success.
    pub async fn publish(&self, records: &[LagRecord]) -> PublishResult<PublishOutcome> {
        let payload = MetricPayload::from_lag_records(Utc::now(), &self.event_hub, records);
        let body = serde_json::to_string(&payload)?;
        let token = self.tokens.acquire(MONITOR_SCOPE).await?;
        if token.refreshed {
            debug!("Publishing with a freshly refreshed token");
        }

        let timer = self.metric_publish.start_timer();
        let outcome = self.transport.submit(&token.value, body).await?;
        timer.observe_duration();

        self.metric_status.set(i64::from(outcome.status));
        Ok(outcome)
    }
}
