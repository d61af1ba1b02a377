use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;

use super::errors::{AuthenticationError, AuthenticationResult};

const IMDS_TOKEN_ENDPOINT: &str = "http://169.254.169.254/metadata/identity/oauth2/token";
const IMDS_API_VERSION: &str = "2018-02-01";
const ENTRA_AUTHORITY: &str = "https://login.microsoftonline.com";

/// An access token, issued for a specific scope (audience).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScopedToken {
    pub scope: String,
    pub value: String,
    pub expires_at: DateTime<Utc>,
}

impl ScopedToken {
    /// `true` if the token expires in less than `safety_margin`, counting from `now`.
    pub fn expires_within(&self, safety_margin: Duration, now: DateTime<Utc>) -> bool {
        self.expires_at - now < safety_margin
    }
}

/// Something able to issue [`ScopedToken`]s: the Azure identity platform, or a fake in tests.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn issue_token(&self, scope: &str) -> AuthenticationResult<ScopedToken>;
}

/// Identity providers report expiration either as JSON number or as numeric string.
#[derive(Deserialize, Debug)]
#[serde(untagged)]
enum Seconds {
    Number(i64),
    Text(String),
}

impl Seconds {
    fn parse(&self, scope: &str) -> AuthenticationResult<i64> {
        match self {
            Seconds::Number(n) => Ok(*n),
            Seconds::Text(s) => s.trim().parse::<i64>().map_err(|e| {
                AuthenticationError::MalformedToken(scope.to_string(), format!("'{s}' is not a number: {e}"))
            }),
        }
    }
}

#[derive(Deserialize, Debug)]
struct ImdsTokenResponse {
    access_token: String,
    /// Seconds since UTC Epoch.
    expires_on: Seconds,
}

#[derive(Deserialize, Debug)]
struct EntraTokenResponse {
    access_token: String,
    /// Seconds from when the token was issued.
    expires_in: Seconds,
}

/// Managed Identity, served by the Azure Instance Metadata Service (IMDS).
pub struct ManagedIdentityCredential {
    http: reqwest::Client,
    client_id: Option<String>,
}

impl ManagedIdentityCredential {
    /// # Arguments
    ///
    /// * `http` - Shared HTTP client
    /// * `client_id` - Client identifier of a user-assigned identity; `None` for the system-assigned one
    pub fn new(http: reqwest::Client, client_id: Option<String>) -> Self {
        Self {
            http,
            client_id,
        }
    }
}

#[async_trait]
impl IdentityProvider for ManagedIdentityCredential {
    async fn issue_token(&self, scope: &str) -> AuthenticationResult<ScopedToken> {
        let mut query = vec![("api-version", IMDS_API_VERSION), ("resource", resource_of(scope))];
        if let Some(client_id) = &self.client_id {
            query.push(("client_id", client_id.as_str()));
        }

        let res = self
            .http
            .get(IMDS_TOKEN_ENDPOINT)
            .header("Metadata", "true")
            .query(&query)
            .send()
            .await
            .map_err(|e| AuthenticationError::Request(scope.to_string(), e))?;

        let body: ImdsTokenResponse = accept(scope, res).await?;
        let expires_on = body.expires_on.parse(scope)?;
        let expires_at = DateTime::from_timestamp(expires_on, 0).ok_or_else(|| {
            AuthenticationError::MalformedToken(scope.to_string(), format!("invalid expiration {expires_on}"))
        })?;

        Ok(ScopedToken {
            scope: scope.to_string(),
            value: body.access_token,
            expires_at,
        })
    }
}

/// Service Principal authenticating with a client secret (OAuth2 client credentials grant).
pub struct ClientSecretCredential {
    http: reqwest::Client,
    tenant_id: String,
    client_id: String,
    client_secret: String,
}

impl ClientSecretCredential {
    pub fn new(http: reqwest::Client, tenant_id: String, client_id: String, client_secret: String) -> Self {
        Self {
            http,
            tenant_id,
            client_id,
            client_secret,
        }
    }
}

#[async_trait]
impl IdentityProvider for ClientSecretCredential {
    async fn issue_token(&self, scope: &str) -> AuthenticationResult<ScopedToken> {
        let requested_at = Utc::now();

        let res = self
            .http
            .post(format!("{ENTRA_AUTHORITY}/{}/oauth2/v2.0/token", self.tenant_id))
            .form(&[
                ("grant_type", "client_credentials"),
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
                ("scope", scope),
            ])
            .send()
            .await
            .map_err(|e| AuthenticationError::Request(scope.to_string(), e))?;

        let body: EntraTokenResponse = accept(scope, res).await?;
        let expires_in = body.expires_in.parse(scope)?;

        Ok(ScopedToken {
            scope: scope.to_string(),
            value: body.access_token,
            // Measured from before the request was sent, so never later than the real expiration
            expires_at: expires_after(scope, requested_at, expires_in)?,
        })
    }
}

fn expires_after(scope: &str, requested_at: DateTime<Utc>, expires_in: i64) -> AuthenticationResult<DateTime<Utc>> {
    Duration::try_seconds(expires_in).and_then(|d| requested_at.checked_add_signed(d)).ok_or_else(|| {
        AuthenticationError::MalformedToken(scope.to_string(), format!("invalid expiration {expires_in}"))
    })
}

/// IMDS speaks "resource" (v1), not "scope" (v2): strip the `/.default` suffix.
fn resource_of(scope: &str) -> &str {
    scope.strip_suffix("/.default").unwrap_or(scope)
}

async fn accept<T: serde::de::DeserializeOwned>(
    scope: &str,
    res: reqwest::Response,
) -> AuthenticationResult<T> {
    let status = res.status();
    if !status.is_success() {
        return Err(AuthenticationError::Rejected {
            scope: scope.to_string(),
            status: status.as_u16(),
            body: res.text().await.unwrap_or_default(),
        });
    }

    res.json::<T>().await.map_err(|e| AuthenticationError::MalformedToken(scope.to_string(), e.to_string()))
}
