use std::net::{IpAddr, SocketAddr};

use clap::{ArgGroup, Parser};
use tokio::time::Duration;

use crate::config::{
    optional, parse_reader_groups, require, ConfigError, ConfigResult, CredentialConfig,
    EmitterConfig,
};
use crate::constants::{
    DEFAULT_HTTP_HOST, DEFAULT_HTTP_PORT, DEFAULT_MAX_CONCURRENT_LOOKUPS, DEFAULT_POLL_INTERVAL_MS,
};

/// Command Line Interface, defined via the declarative,
/// `derive` based functionality of the `clap` crate.
///
/// Every Azure setting can also be provided via environment variable,
/// using the same keys as the existing emitter deployments.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
#[command(group(
    ArgGroup::new("logging_flags")
        .required(false)
        .multiple(false)
        .args(["verbose", "quiet"]),
))]
pub struct Cli {
    // ---------------------------------------------------------------------------- Event Hubs
    /// Event Hubs Namespace that contains the monitored Event Hub.
    #[arg(long = "namespace", env = "EventHubNamespace", value_name = "NAMESPACE")]
    pub namespace: Option<String>,

    /// Event Hub to monitor.
    #[arg(long = "event-hub", env = "EventHubName", value_name = "EVENT_HUB")]
    pub event_hub: Option<String>,

    /// Consumer Groups to monitor (format: 'GROUP;GROUP;...').
    ///
    /// If omitted or empty, all Consumer Groups of the Event Hub are discovered at startup.
    #[arg(long = "consumer-groups", env = "ConsumerGroup", value_name = "GROUPS", verbatim_doc_comment)]
    pub consumer_groups: Option<String>,

    // ------------------------------------------------------------------------ Checkpoint store
    /// Storage Account holding the Consumer Groups checkpoints.
    #[arg(long = "checkpoint-account", env = "CheckpointAccountName", value_name = "ACCOUNT")]
    pub checkpoint_account: Option<String>,

    /// Blob Container holding the Consumer Groups checkpoints.
    #[arg(long = "checkpoint-container", env = "CheckpointContainerName", value_name = "CONTAINER")]
    pub checkpoint_container: Option<String>,

    // ---------------------------------------------------------------------------- Azure Monitor
    /// Azure region of the Event Hubs Namespace (e.g. 'westeurope').
    #[arg(long, env = "Region", value_name = "REGION")]
    pub region: Option<String>,

    /// Entra ID tenant.
    #[arg(long = "tenant-id", env = "TenantId", value_name = "TENANT_ID")]
    pub tenant_id: Option<String>,

    /// Subscription of the Event Hubs Namespace.
    #[arg(long = "subscription-id", env = "SubscriptionId", value_name = "SUBSCRIPTION_ID")]
    pub subscription_id: Option<String>,

    /// Resource Group of the Event Hubs Namespace.
    #[arg(long = "resource-group", env = "ResourceGroup", value_name = "RESOURCE_GROUP")]
    pub resource_group: Option<String>,

    // ----------------------------------------------------------------------------- Credentials
    /// Client identifier of a user-assigned Managed Identity.
    ///
    /// If omitted, the system-assigned Managed Identity is used.
    #[arg(long = "managed-identity-client-id", env = "ManagedIdentityClientId", value_name = "CLIENT_ID")]
    pub managed_identity_client_id: Option<String>,

    /// Client identifier of a Service Principal, paired with '--client-secret'.
    #[arg(long = "client-id", env = "AZURE_CLIENT_ID", value_name = "CLIENT_ID")]
    pub client_id: Option<String>,

    /// Client secret of a Service Principal.
    ///
    /// If set, it takes precedence over Managed Identity.
    #[arg(long = "client-secret", env = "AZURE_CLIENT_SECRET", value_name = "SECRET", hide_env_values = true)]
    pub client_secret: Option<String>,

    // --------------------------------------------------------------------------------- Polling
    /// How often (milliseconds) lag is measured and published.
    #[arg(long = "interval", env = "CustomMetricInterval", value_name = "MILLISECONDS", default_value = DEFAULT_POLL_INTERVAL_MS)]
    pub interval_ms: u64,

    /// Maximum amount of partition lookups running concurrently, during a poll cycle.
    #[arg(long = "max-concurrent-lookups", value_name = "LOOKUPS", default_value = DEFAULT_MAX_CONCURRENT_LOOKUPS)]
    pub max_concurrent_lookups: usize,

    // ------------------------------------------------------------------------------------ HTTP
    /// Host address to listen on for HTTP requests (internal metrics).
    ///
    /// Supports both IPv4 and IPv6 addresses.
    #[arg(long, default_value = DEFAULT_HTTP_HOST, verbatim_doc_comment)]
    pub host: IpAddr,

    /// Port to listen on for HTTP requests (internal metrics).
    #[arg(long, default_value = DEFAULT_HTTP_PORT)]
    pub port: u16,

    /// Verbose logging.
    ///
    /// * none    = 'INFO'
    /// * '-v'    = 'DEBUG'
    /// * '-vv'   = 'TRACE'
    ///
    /// Alternatively, set environment variable 'HUBLAG_LOG=(ERROR|WARN|INFO|DEBUG|TRACE|OFF)'.
    #[arg(short, long, action = clap::ArgAction::Count, verbatim_doc_comment)]
    pub verbose: u8,

    /// Quiet logging.
    ///
    /// * none    = 'INFO'
    /// * '-q'    = 'WARN'
    /// * '-qq'   = 'ERROR'
    /// * '-qqq'  = 'OFF'
    ///
    /// Alternatively, set environment variable 'HUBLAG_LOG=(ERROR|WARN|INFO|DEBUG|TRACE|OFF)'.
    #[arg(short, long, action = clap::ArgAction::Count, verbatim_doc_comment)]
    pub quiet: u8,
}

impl Cli {
    pub fn parse_and_validate() -> Self {
        Self::parse()
    }

    pub fn verbosity_level(&self) -> i8 {
        self.verbose as i8 - self.quiet as i8
    }

    pub fn listen_on(&self) -> SocketAddr {
        SocketAddr::from((self.host, self.port))
    }

    /// Validate the parsed arguments into an [`EmitterConfig`].
    ///
    /// Fails with [`ConfigError`] on the first missing or invalid setting.
    pub fn build_emitter_config(&self) -> ConfigResult<EmitterConfig> {
        let tenant_id = require("TenantId", &self.tenant_id)?;

        let credential = match (optional(&self.client_id), optional(&self.client_secret)) {
            (Some(client_id), Some(client_secret)) => CredentialConfig::ClientSecret {
                tenant_id: tenant_id.clone(),
                client_id,
                client_secret,
            },
            (None, Some(_)) => return Err(ConfigError::MissingSetting("AZURE_CLIENT_ID")),
            _ => CredentialConfig::ManagedIdentity {
                client_id: optional(&self.managed_identity_client_id),
            },
        };

        if self.interval_ms == 0 {
            return Err(ConfigError::InvalidSetting(
                "CustomMetricInterval",
                "must be greater than 0".to_string(),
            ));
        }
        if self.max_concurrent_lookups == 0 {
            return Err(ConfigError::InvalidSetting(
                "max-concurrent-lookups",
                "must be greater than 0".to_string(),
            ));
        }

        let config = EmitterConfig {
            namespace: require("EventHubNamespace", &self.namespace)?,
            event_hub: require("EventHubName", &self.event_hub)?,
            reader_groups: self.consumer_groups.as_deref().map(parse_reader_groups).unwrap_or_default(),
            checkpoint_account: require("CheckpointAccountName", &self.checkpoint_account)?,
            checkpoint_container: require("CheckpointContainerName", &self.checkpoint_container)?,
            region: require("Region", &self.region)?,
            tenant_id,
            subscription_id: require("SubscriptionId", &self.subscription_id)?,
            resource_group: require("ResourceGroup", &self.resource_group)?,
            credential,
            poll_interval: Duration::from_millis(self.interval_ms),
            max_concurrent_lookups: self.max_concurrent_lookups,
        };

        trace!("Created:\n{:#?}", config);
        Ok(config)
    }
}
