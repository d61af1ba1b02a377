// Inner modules
mod errors;
mod provider;
mod token_cache;

use std::sync::Arc;

use prometheus::Registry;

use crate::config::CredentialConfig;
use provider::{ClientSecretCredential, ManagedIdentityCredential};

// Exports
pub use errors::AuthenticationError;
pub use provider::IdentityProvider;
pub use token_cache::TokenCache;

#[cfg(test)]
pub(crate) use token_cache::test::{token_cache, FakeIdentityProvider};

/// Create the [`TokenCache`] shared by all Azure clients, backed by the configured identity provider.
pub fn init(credential: &CredentialConfig, http: reqwest::Client, metrics: Arc<Registry>) -> Arc<TokenCache> {
    let provider: Arc<dyn IdentityProvider> = match credential {
        CredentialConfig::ManagedIdentity {
            client_id,
        } => {
            info!(
                "Authenticating with {} Managed Identity",
                if client_id.is_some() { "user-assigned" } else { "system-assigned" }
            );
            Arc::new(ManagedIdentityCredential::new(http, client_id.clone()))
        },
        CredentialConfig::ClientSecret {
            tenant_id,
            client_id,
            client_secret,
        } => {
            info!("Authenticating with Service Principal '{client_id}' of tenant '{tenant_id}'");
            Arc::new(ClientSecretCredential::new(
                http,
                tenant_id.clone(),
                client_id.clone(),
                client_secret.clone(),
            ))
        },
    };

    debug!("Initialized");
    Arc::new(TokenCache::new(provider, metrics))
}
