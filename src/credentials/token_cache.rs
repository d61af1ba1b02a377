use std::collections::HashMap;
use std::sync::Arc;

use chrono::{Duration, Utc};
use prometheus::{register_int_counter_vec_with_registry, IntCounterVec, Registry};
use tokio::sync::{Mutex, RwLock};

use super::errors::AuthenticationResult;
use super::provider::{IdentityProvider, ScopedToken};
use crate::prometheus_metrics::LABEL_SCOPE;

/// Tokens are refreshed once they get this close (seconds) to their expiration.
const REFRESH_SAFETY_MARGIN_SECS: i64 = 5 * 60;

const MET_REFRESH_NAME: &str = "token_refreshes_total";
const MET_REFRESH_HELP: &str = "Access tokens obtained from the identity provider, by scope";

/// Slot holding the latest token of a single scope.
///
/// The async [`Mutex`] is held for the whole refresh: concurrent callers for the same scope
/// wait for the refresh in progress, instead of starting their own.
type Slot = Arc<Mutex<Option<ScopedToken>>>;

/// Access token value, returned by [`TokenCache::acquire`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AcquiredToken {
    /// Bearer token value.
    pub value: String,

    /// `true` if the identity provider was asked for a new token during this call.
    pub refreshed: bool,
}

/// Caches one access token per scope, refreshing it on demand.
///
/// Scopes are independent: each has its own [`Slot`], so a slow refresh of one scope
/// never blocks callers of another.
pub struct TokenCache {
    provider: Arc<dyn IdentityProvider>,
    safety_margin: Duration,
    slots: RwLock<HashMap<String, Slot>>,

    // Prometheus Metrics
    metric_refresh: IntCounterVec,
}

impl TokenCache {
    /// Create a new, empty [`TokenCache`].
    ///
    /// # Arguments
    ///
    /// * `provider` - Identity provider that issues tokens on refresh
    /// * `metrics` - Registry to register the cache metrics with
    pub fn new(provider: Arc<dyn IdentityProvider>, metrics: Arc<Registry>) -> Self {
        Self {
            provider,
            safety_margin: Duration::seconds(REFRESH_SAFETY_MARGIN_SECS),
            slots: RwLock::new(HashMap::new()),
            metric_refresh: register_int_counter_vec_with_registry!(
                MET_REFRESH_NAME,
                MET_REFRESH_HELP,
                &[LABEL_SCOPE],
                metrics
            )
            .unwrap_or_else(|e| panic!("Failed to create metric '{MET_REFRESH_NAME}': {e}")),
        }
    }

    /// Get a token for `scope`, refreshing it first if absent or about to expire.
    ///
    /// A failed refresh is returned as an error: a stale token is never handed out.
    pub async fn acquire(&self, scope: &str) -> AuthenticationResult<AcquiredToken> {
        let slot = self.slot(scope).await;
        let mut guard = slot.lock().await;

        if let Some(token) = guard.as_ref() {
            if !token.expires_within(self.safety_margin, Utc::now()) {
                return Ok(AcquiredToken {
                    value: token.value.clone(),
                    refreshed: false,
                });
            }
            debug!("Token for scope '{scope}' expires at {}: refreshing", token.expires_at);
        } else {
            debug!("No token for scope '{scope}' yet: fetching");
        }

        let fresh = self.provider.issue_token(scope).await?;
        self.metric_refresh.with_label_values(&[scope]).inc();
        info!("Obtained token for scope '{}', expiring at {}", fresh.scope, fresh.expires_at);

        let value = fresh.value.clone();
        *guard = Some(fresh);

        Ok(AcquiredToken {
            value,
            refreshed: true,
        })
    }

    /// Fetch tokens for the given scopes ahead of their first use.
    ///
    /// Failures are only logged: the scopes will be retried on first [`Self::acquire`].
    pub async fn prefetch(&self, scopes: &[&str]) {
        for scope in scopes {
            if let Err(e) = self.acquire(scope).await {
                warn!("Unable to prefetch token for scope '{scope}': {e}");
            }
        }
    }

    async fn slot(&self, scope: &str) -> Slot {
        if let Some(slot) = self.slots.read().await.get(scope) {
            return slot.clone();
        }

        self.slots.write().await.entry(scope.to_string()).or_default().clone()
    }
}
