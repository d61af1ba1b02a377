use thiserror::Error;

/// Possible errors when obtaining an access token from an identity provider.
#[derive(Error, Debug)]
pub enum AuthenticationError {
    /// The request to the identity provider could not be completed.
    #[error("Token request for scope '{0}' failed: {1}")]
    Request(String, #[source] reqwest::Error),

    /// The identity provider answered, but refused to issue a token.
    #[error("Identity provider refused token for scope '{scope}' (status {status}): {body}")]
    Rejected {
        scope: String,
        status: u16,
        body: String,
    },

    /// The identity provider issued something that can't be used as a token.
    #[error("Malformed token for scope '{0}': {1}")]
    MalformedToken(String, String),
}

pub type AuthenticationResult<T> = Result<T, AuthenticationError>;
