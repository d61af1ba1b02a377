use std::fmt;

use thiserror::Error;
use tokio::time::Duration;

use crate::constants::{MONITORING_HOST_SUFFIX, SERVICE_BUS_HOST_SUFFIX, STORAGE_HOST_SUFFIX};

/// Possible errors when validating the configuration, before the service starts.
#[derive(Error, Debug, Eq, PartialEq)]
pub enum ConfigError {
    #[error("Configuration error, missing key '{0}'")]
    MissingSetting(&'static str),

    #[error("Configuration error, invalid value for '{0}': {1}")]
    InvalidSetting(&'static str, String),
}

pub type ConfigResult<T> = Result<T, ConfigError>;

/// How the service authenticates against Azure.
#[derive(Clone, PartialEq, Eq)]
pub enum CredentialConfig {
    /// Managed Identity, via the Azure Instance Metadata Service.
    /// `client_id` selects a user-assigned identity.
    ManagedIdentity {
        client_id: Option<String>,
    },

    /// Service principal, authenticating with a client secret against Entra ID.
    ClientSecret {
        tenant_id: String,
        client_id: String,
        client_secret: String,
    },
}

impl fmt::Debug for CredentialConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CredentialConfig::ManagedIdentity {
                client_id,
            } => f.debug_struct("ManagedIdentity").field("client_id", client_id).finish(),
            CredentialConfig::ClientSecret {
                tenant_id,
                client_id,
                ..
            } => f
                .debug_struct("ClientSecret")
                .field("tenant_id", tenant_id)
                .field("client_id", client_id)
                .field("client_secret", &"<redacted>")
                .finish(),
        }
    }
}

/// Validated configuration of the service.
///
/// Built once at startup from [`crate::cli::Cli`]: if this exists, every required setting is present.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmitterConfig {
    pub namespace: String,
    pub event_hub: String,
    /// Reader (consumer) groups to monitor: empty means "discover all".
    pub reader_groups: Vec<String>,
    pub checkpoint_account: String,
    pub checkpoint_container: String,
    pub region: String,
    pub tenant_id: String,
    pub subscription_id: String,
    pub resource_group: String,
    pub credential: CredentialConfig,
    pub poll_interval: Duration,
    pub max_concurrent_lookups: usize,
}

impl EmitterConfig {
    /// Fully qualified host name of the Event Hubs namespace.
    pub fn fully_qualified_namespace(&self) -> String {
        format!("{}{SERVICE_BUS_HOST_SUFFIX}", self.namespace.to_lowercase())
    }

    /// Azure Resource Manager identifier of the Event Hubs namespace.
    pub fn resource_id(&self) -> String {
        format!(
            "/subscriptions/{}/resourceGroups/{}/providers/Microsoft.EventHub/namespaces/{}",
            self.subscription_id, self.resource_group, self.namespace
        )
    }

    /// Regional Azure Monitor endpoint that accepts custom metrics for [`Self::resource_id`].
    pub fn metrics_endpoint(&self) -> String {
        format!("https://{}{MONITORING_HOST_SUFFIX}{}/metrics", self.region, self.resource_id())
    }

    /// Base URL of the Event Hub, on the Event Hubs REST API.
    pub fn event_hub_url(&self) -> String {
        format!("https://{}/{}", self.fully_qualified_namespace(), self.event_hub)
    }

    /// URL of the Blob Storage container holding checkpoints.
    pub fn checkpoint_container_url(&self) -> String {
        format!(
            "https://{}{STORAGE_HOST_SUFFIX}/{}",
            self.checkpoint_account, self.checkpoint_container
        )
    }

    /// Blob name prefix, shared by all checkpoints of this Event Hub.
    pub fn checkpoint_prefix(&self) -> String {
        format!("{}/{}", self.fully_qualified_namespace(), self.event_hub.to_lowercase())
    }
}

/// Split a `;` separated list of reader groups, ignoring blank entries.
pub fn parse_reader_groups(raw: &str) -> Vec<String> {
    raw.split(';').map(str::trim).filter(|g| !g.is_empty()).map(String::from).collect()
}

/// Returns the value if present and not blank, or [`ConfigError::MissingSetting`].
pub fn require(key: &'static str, value: &Option<String>) -> ConfigResult<String> {
    match optional(value) {
        Some(v) => Ok(v),
        None => Err(ConfigError::MissingSetting(key)),
    }
}

/// Returns the value only if present and not blank.
pub fn optional(value: &Option<String>) -> Option<String> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty()).map(String::from)
}
