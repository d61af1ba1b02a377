use std::sync::Arc;

use async_trait::async_trait;
use reqwest::Url;

use super::atom::{entry_titles, partition_field, PartitionField};
use super::TopologySource;
use crate::config::{ConfigError, ConfigResult, EmitterConfig};
use crate::constants::{EVENTHUBS_API_VERSION, EVENTHUBS_SCOPE};
use crate::credentials::TokenCache;
use crate::lag::{LookupError, LookupResult, PartitionTailInfo, PartitionTailSource};

/// Server side timeout (seconds) requested when listing consumer groups.
const LIST_TIMEOUT_SECS: &str = "60";

/// Client of the Event Hubs REST API, for a single Event Hub.
///
/// Lists consumer groups and partitions, and reads partitions' tail.
/// Requests are authenticated with a bearer token for [`EVENTHUBS_SCOPE`].
pub struct EventHubsClient {
    http: reqwest::Client,
    tokens: Arc<TokenCache>,
    event_hub_url: Url,
}

impl EventHubsClient {
    pub fn new(http: reqwest::Client, tokens: Arc<TokenCache>, config: &EmitterConfig) -> ConfigResult<Self> {
        let event_hub_url = Url::parse(&config.event_hub_url())
            .map_err(|e| ConfigError::InvalidSetting("EventHubNamespace", e.to_string()))?;

        Ok(Self {
            http,
            tokens,
            event_hub_url,
        })
    }

    /// URL of a resource under the Event Hub: path segments are percent-encoded as needed.
    fn url(&self, segments: &[&str]) -> Url {
        let mut url = self.event_hub_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url.query_pairs_mut().append_pair("api-version", EVENTHUBS_API_VERSION);
        url
    }

    async fn get(&self, url: Url) -> LookupResult<String> {
        let token = self.tokens.acquire(EVENTHUBS_SCOPE).await?;

        trace!("GET {url}");
        let res = self
            .http
            .get(url.clone())
            .bearer_auth(token.value)
            .send()
            .await
            .map_err(|e| LookupError::Request(url.to_string(), e))?;

        let status = res.status();
        if !status.is_success() {
            return Err(LookupError::UnexpectedStatus(url.to_string(), status.as_u16()));
        }

        res.text().await.map_err(|e| LookupError::Request(url.to_string(), e))
    }
}

#[async_trait]
impl TopologySource for EventHubsClient {
    async fn list_reader_groups(&self) -> LookupResult<Vec<String>> {
        let mut url = self.url(&["consumergroups"]);
        url.query_pairs_mut().append_pair("timeout", LIST_TIMEOUT_SECS);

        info!("Listing Consumer Groups: {url}");
        Ok(entry_titles(&self.get(url).await?))
    }

    async fn list_partitions(&self) -> LookupResult<Vec<String>> {
        let url = self.url(&["partitions"]);

        info!("Listing Partitions: {url}");
        Ok(entry_titles(&self.get(url).await?))
    }
}

#[async_trait]
impl PartitionTailSource for EventHubsClient {
    async fn fetch_tail(&self, reader_group: &str, partition_id: &str) -> LookupResult<PartitionTailInfo> {
        let url = self.url(&["consumergroups", reader_group, "partitions", partition_id]);
        let xml = self.get(url.clone()).await?;

        parse_partition_tail(url.as_str(), &xml)
    }
}

/// Read the [`PartitionTailInfo`] out of a `PartitionDescription`.
///
/// `EndSequenceNumber` is the sequence number of the last enqueued event.
fn parse_partition_tail(url: &str, xml: &str) -> LookupResult<PartitionTailInfo> {
    Ok(PartitionTailInfo {
        last_enqueued_sequence_number: parse_field(url, xml, PartitionField::EndSequenceNumber)?,
        last_enqueued_offset: parse_field(url, xml, PartitionField::LastEnqueuedOffset)?,
    })
}

fn parse_field(url: &str, xml: &str, field: PartitionField) -> LookupResult<i64> {
    let text = partition_field(xml, field).ok_or_else(|| LookupError::MissingField(url.to_string(), field.name()))?;

    text.parse::<i64>().map_err(|_| LookupError::InvalidField(url.to_string(), field.name(), text))
}
