use thiserror::Error;

use crate::credentials::AuthenticationError;

/// Possible errors when publishing the metric payload.
///
/// A response with a non-success status is not an error: see [`super::PublishOutcome`].
#[derive(Error, Debug)]
pub enum PublishError {
    #[error("Unable to authenticate publish: {0}")]
    Authentication(#[from] AuthenticationError),

    #[error("Failed to serialize metric payload: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Publish to '{0}' failed: {1}")]
    Transport(String, #[source] reqwest::Error),
}

pub type PublishResult<T> = Result<T, PublishError>;
