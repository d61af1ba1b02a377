// Inner modules
mod atom;
mod client;

use std::sync::Arc;

use async_trait::async_trait;

use crate::config::{ConfigResult, EmitterConfig};
use crate::credentials::TokenCache;
use crate::lag::{LookupResult, ReaderGroupPartitions};

// Exports
pub use client::EventHubsClient;

/// Lists what can be read from the Event Hub.
#[async_trait]
pub trait TopologySource: Send + Sync {
    /// Names of all the reader (consumer) groups of the Event Hub.
    async fn list_reader_groups(&self) -> LookupResult<Vec<String>>;

    /// Identifiers of all the partitions of the Event Hub.
    async fn list_partitions(&self) -> LookupResult<Vec<String>>;
}

/// Create the [`EventHubsClient`] of the monitored Event Hub.
pub fn init(http: reqwest::Client, tokens: Arc<TokenCache>, config: &EmitterConfig) -> ConfigResult<EventHubsClient> {
    let client = EventHubsClient::new(http, tokens, config)?;
    info!("Monitoring Event Hub: {}", config.event_hub_url());

    debug!("Initialized");
    Ok(client)
}

/// Pair each reader group to monitor with the partitions of the Event Hub.
///
/// When `configured_groups` is empty, all the reader groups of the Event Hub are discovered.
/// Every reader group reads every partition.
///
/// # Arguments
///
/// * `source` - Where to list reader groups and partitions from
/// * `configured_groups` - Reader groups explicitly configured for monitoring
pub async fn resolve_topology(
    source: &dyn TopologySource,
    configured_groups: &[String],
) -> LookupResult<Vec<ReaderGroupPartitions>> {
    let reader_groups = if configured_groups.is_empty() {
        let discovered = source.list_reader_groups().await?;
        info!("Discovered {} Consumer Groups: {:?}", discovered.len(), discovered);
        discovered
    } else {
        configured_groups.to_vec()
    };

    if reader_groups.is_empty() {
        warn!("No Consumer Groups to monitor: lag will not be published");
        return Ok(Vec::new());
    }

    let partitions = source.list_partitions().await?;
    info!("Event Hub has {} Partitions: {:?}", partitions.len(), partitions);

    Ok(reader_groups
        .into_iter()
        .map(|reader_group| ReaderGroupPartitions {
            reader_group,
            partitions: partitions.clone(),
        })
        .collect())
}
