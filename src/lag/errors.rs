use thiserror::Error;

use crate::credentials::AuthenticationError;

/// Possible errors when looking up partitions, reader groups or checkpoints.
#[derive(Error, Debug)]
pub enum LookupError {
    /// Unable to get a token to authenticate the lookup.
    #[error("Unable to authenticate lookup: {0}")]
    Authentication(#[from] AuthenticationError),

    /// The request could not be completed.
    #[error("Request to '{0}' failed: {1}")]
    Request(String, #[source] reqwest::Error),

    /// The request completed with an unexpected status.
    #[error("Request to '{0}' returned status {1}")]
    UnexpectedStatus(String, u16),

    /// A field is missing from the response.
    #[error("Response from '{0}' is missing '{1}'")]
    MissingField(String, &'static str),

    /// A field of the response has a value that can't be used.
    #[error("Response from '{0}' has invalid '{1}': {2:?}")]
    InvalidField(String, &'static str, String),
}

pub type LookupResult<T> = Result<T, LookupError>;
