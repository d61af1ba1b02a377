use const_format::formatcp;

/// Token scope (audience) of Azure Monitor, where the custom metric is published.
pub(crate) const MONITOR_SCOPE: &str = "https://monitor.azure.com/.default";

/// Token scope (audience) of the Event Hubs management/runtime REST API.
pub(crate) const EVENTHUBS_SCOPE: &str = "https://eventhubs.azure.net/.default";

/// Token scope (audience) of Azure Blob Storage, where checkpoints are stored.
pub(crate) const STORAGE_SCOPE: &str = "https://storage.azure.com/.default";

pub(crate) const SERVICE_BUS_HOST_SUFFIX: &str = ".servicebus.windows.net";
pub(crate) const STORAGE_HOST_SUFFIX: &str = ".blob.core.windows.net";
pub(crate) const MONITORING_HOST_SUFFIX: &str = ".monitoring.azure.com";

/// Version of the Event Hubs (Service Bus) REST API that still serves Atom feeds.
pub(crate) const EVENTHUBS_API_VERSION: &str = "2014-01";

/// Version of the Blob Storage REST API, sent as `x-ms-version`.
pub(crate) const STORAGE_API_VERSION: &str = "2021-08-06";

/// Name of the custom metric published to Azure Monitor.
pub(crate) const LAG_METRIC_NAME: &str = "Lag";

/// Azure Monitor namespace the custom metric is published under.
pub(crate) const CUSTOM_METRIC_NAMESPACE: &str = "Event Hub custom metrics";

/// Dimensions of the custom metric, in the same order as each series' values.
pub(crate) const METRIC_DIMENSION_NAMES: [&str; 3] = ["EventHubName", "ConsumerGroup", "PartitionId"];

pub(crate) const USER_AGENT: &str =
    formatcp!("{}/{}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"));

pub(crate) const DEFAULT_POLL_INTERVAL_MS: &str = "10000";
pub(crate) const DEFAULT_MAX_CONCURRENT_LOOKUPS: &str = "32";
pub(crate) const DEFAULT_HTTP_HOST: &str = "127.0.0.1";
pub(crate) const DEFAULT_HTTP_PORT: &str = "6564";
