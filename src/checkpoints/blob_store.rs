use std::sync::Arc;

use async_trait::async_trait;
use reqwest::header::HeaderMap;
use reqwest::{StatusCode, Url};

use crate::config::{ConfigError, ConfigResult, EmitterConfig};
use crate::constants::{STORAGE_API_VERSION, STORAGE_SCOPE};
use crate::credentials::TokenCache;
use crate::lag::{CheckpointSource, CheckpointState, LookupError, LookupResult};

const HEADER_STORAGE_VERSION: &str = "x-ms-version";
const HEADER_META_SEQUENCE_NUMBER: &str = "x-ms-meta-sequencenumber";
const HEADER_META_OFFSET: &str = "x-ms-meta-offset";

/// Reads the checkpoints that Event Processor clients store as blobs, in Azure Blob Storage.
///
/// There is one (empty) blob per reader group and partition: the checkpoint
/// is held by the blob metadata, `sequencenumber` and `offset`.
pub struct BlobCheckpointStore {
    http: reqwest::Client,
    tokens: Arc<TokenCache>,
    container_url: Url,
    prefix: String,
}

impl BlobCheckpointStore {
    pub fn new(http: reqwest::Client, tokens: Arc<TokenCache>, config: &EmitterConfig) -> ConfigResult<Self> {
        let container_url = Url::parse(&config.checkpoint_container_url())
            .map_err(|e| ConfigError::InvalidSetting("CheckpointAccountName", e.to_string()))?;

        Ok(Self {
            http,
            tokens,
            container_url,
            prefix: config.checkpoint_prefix(),
        })
    }

    /// URL of the blob holding the checkpoint of `reader_group` for `partition_id`.
    fn blob_url(&self, reader_group: &str, partition_id: &str) -> Url {
        let mut url = self.container_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty()
                .extend(self.prefix.split('/'))
                .extend([reader_group.to_lowercase().as_str(), "checkpoint", partition_id]);
        }
        url
    }
}

#[async_trait]
impl CheckpointSource for BlobCheckpointStore {
    async fn fetch_checkpoint(
        &self,
        reader_group: &str,
        partition_id: &str,
    ) -> LookupResult<Option<CheckpointState>> {
        let url = self.blob_url(reader_group, partition_id);
        let token = self.tokens.acquire(STORAGE_SCOPE).await?;

        trace!("HEAD {url}");
        let res = self
            .http
            .head(url.clone())
            .bearer_auth(token.value)
            .header(HEADER_STORAGE_VERSION, STORAGE_API_VERSION)
            .send()
            .await
            .map_err(|e| LookupError::Request(url.to_string(), e))?;

        match res.status() {
            StatusCode::NOT_FOUND => {
                debug!("No checkpoint for Consumer Group '{reader_group}' on Partition '{partition_id}'");
                Ok(None)
            },
            s if s.is_success() => parse_checkpoint(url.as_str(), res.headers()).map(Some),
            s => Err(LookupError::UnexpectedStatus(url.to_string(), s.as_u16())),
        }
    }
}

/// Read the [`CheckpointState`] out of the metadata headers of a checkpoint blob.
///
/// Either value can be missing: the blob may exist before a checkpoint is ever written to it.
fn parse_checkpoint(url: &str, headers: &HeaderMap) -> LookupResult<CheckpointState> {
    let sequence_number = match header_value(headers, HEADER_META_SEQUENCE_NUMBER) {
        Some(v) => Some(v.parse::<i64>().map_err(|_| {
            LookupError::InvalidField(url.to_string(), HEADER_META_SEQUENCE_NUMBER, v.to_string())
        })?),
        None => None,
    };

    Ok(CheckpointState {
        sequence_number,
        offset: header_value(headers, HEADER_META_OFFSET).map(String::from),
    })
}

fn header_value<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok()).map(str::trim).filter(|v| !v.is_empty())
}

#[cfg(test)]
mod test {
    use std::sync::Arc;

    use chrono::Duration;
    use reqwest::header::{HeaderMap, HeaderValue};

    use super::*;
    use crate::config::test::example_config;
    use crate::credentials::{token_cache, FakeIdentityProvider};

    fn store() -> BlobCheckpointStore {
        let tokens = Arc::new(token_cache(Arc::new(FakeIdentityProvider::valid_for(Duration::hours(1)))));
        BlobCheckpointStore::new(reqwest::Client::new(), tokens, &example_config()).unwrap()
    }

    fn headers(pairs: &[(&'static str, &'static str)]) -> HeaderMap {
        let mut h = HeaderMap::new();
        for (k, v) in pairs {
            h.insert(*k, HeaderValue::from_static(v));
        }
        h
    }

    #[test]
    fn blob_url_follows_checkpoint_layout() {
        assert_eq!(
            store().blob_url("$Default", "0").as_str(),
            "https://ckptaccount.blob.core.windows.net/checkpoints/mynamespace.servicebus.windows.net/orders/$default/checkpoint/0"
        );
        assert_eq!(
            store().blob_url("Billing", "12").as_str(),
            "https://ckptaccount.blob.core.windows.net/checkpoints/mynamespace.servicebus.windows.net/orders/billing/checkpoint/12"
        );
    }

    #[test]
    fn parses_checkpoint_metadata() {
        let state = parse_checkpoint(
            "u",
            &headers(&[(HEADER_META_SEQUENCE_NUMBER, "90"), (HEADER_META_OFFSET, "450"), ("etag", "x")]),
        )
        .unwrap();

        assert_eq!(
            state,
            CheckpointState {
                sequence_number: Some(90),
                offset: Some("450".to_string()),
            }
        );
    }

    #[test]
    fn metadata_can_be_missing() {
        assert_eq!(
            parse_checkpoint("u", &headers(&[(HEADER_META_OFFSET, " ")])).unwrap(),
            CheckpointState {
                sequence_number: None,
                offset: None,
            }
        );
    }

    #[test]
    fn rejects_invalid_sequence_number() {
        assert!(matches!(
            parse_checkpoint("u", &headers(&[(HEADER_META_SEQUENCE_NUMBER, "ninety")])),
            Err(LookupError::InvalidField(_, HEADER_META_SEQUENCE_NUMBER, v)) if v == "ninety"
        ));
    }
}
