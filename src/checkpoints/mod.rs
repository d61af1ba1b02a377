// Inner modules
mod blob_store;

use std::sync::Arc;

use crate::config::{ConfigResult, EmitterConfig};
use crate::credentials::TokenCache;

// Exports
pub use blob_store::BlobCheckpointStore;

/// Create the [`BlobCheckpointStore`] reading the checkpoints of the monitored Event Hub.
pub fn init(
    http: reqwest::Client,
    tokens: Arc<TokenCache>,
    config: &EmitterConfig,
) -> ConfigResult<BlobCheckpointStore> {
    let store = BlobCheckpointStore::new(http, tokens, config)?;
    info!("Reading checkpoints from: {}/{}", config.checkpoint_container_url(), config.checkpoint_prefix());

    debug!("Initialized");
    Ok(store)
}
