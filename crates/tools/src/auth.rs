//! OAuth2 client-credentials tokens for the tool gateway.
//!
//! [`TokenCache`] holds one bearer token and refreshes it through a
//! [`CredentialExchange`] when it is missing or within
//! [`EXPIRY_BUFFER_SECS`] of expiry.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use memoria_core::error::AuthError;
use std::sync::{Arc, Mutex};
use tracing::{debug, info};

/// A token this close to expiry is treated as expired.
pub const EXPIRY_BUFFER_SECS: i64 = 60;

/// Lifetime assumed when the token endpoint omits `expires_in`.
pub const DEFAULT_EXPIRES_IN_SECS: u64 = 3600;

/// Longer lifetimes reported by the endpoint are clamped to this.
pub const MAX_EXPIRES_IN_SECS: u64 = 86_400;

const EXCHANGE_TIMEOUT_SECS: u64 = 30;

/// A token as issued by the endpoint.
#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub access_token: String,
    pub expires_in: Option<u64>,
}

/// Obtains a fresh token. One call is one outbound request.
#[async_trait]
pub trait CredentialExchange: Send + Sync {
    async fn exchange(&self) -> Result<IssuedToken, AuthError>;
}

/// Client id and secret for the token endpoint.
#[derive(Clone)]
pub struct ClientCredentials {
    pub token_endpoint: String,
    pub client_id: String,
    pub client_secret: String,
}

impl std::fmt::Debug for ClientCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientCredentials")
            .field("token_endpoint", &self.token_endpoint)
            .field("client_id", &self.client_id)
            .field("client_secret", &"[REDACTED]")
            .finish()
    }
}

/// Form-encoded `grant_type=client_credentials` exchange over HTTP.
pub struct ClientCredentialsExchange {
    client: reqwest::Client,
    credentials: ClientCredentials,
}

impl ClientCredentialsExchange {
    pub fn new(credentials: ClientCredentials) -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(EXCHANGE_TIMEOUT_SECS))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self {
            client,
            credentials,
        }
    }
}

#[async_trait]
impl CredentialExchange for ClientCredentialsExchange {
    async fn exchange(&self) -> Result<IssuedToken, AuthError> {
        let creds = &self.credentials;
        let response = self
            .client
            .post(&creds.token_endpoint)
            .form(&[
                ("grant_type", "client_credentials"),
                ("client_id", creds.client_id.as_str()),
                ("client_secret", creds.client_secret.as_str()),
            ])
            .send()
            .await
            .map_err(|e| AuthError::Unreachable(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AuthError::Rejected {
                status_code: status.as_u16(),
                message: body,
            });
        }

        let body: serde_json::Value = response
            .json()
            .await
            .map_err(|e| AuthError::InvalidResponse(e.to_string()))?;

        let access_token = body
            .get("access_token")
            .and_then(|v| v.as_str())
            .filter(|t| !t.is_empty())
            .ok_or_else(|| AuthError::InvalidResponse("missing access_token".into()))?;

        Ok(IssuedToken {
            access_token: access_token.to_string(),
            expires_in: body.get("expires_in").and_then(|v| v.as_u64()),
        })
    }
}

#[derive(Debug, Clone)]
struct CachedToken {
    token: String,
    expires_at: DateTime<Utc>,
}

impl CachedToken {
    fn is_fresh(&self, now: DateTime<Utc>) -> bool {
        now.checked_add_signed(Duration::seconds(EXPIRY_BUFFER_SECS))
            .is_some_and(|t| t < self.expires_at)
    }
}

/// Process-wide bearer token cache.
///
/// The lock is never held across the exchange, so two callers racing on an
/// empty cache may both exchange; the later token wins.
pub struct TokenCache {
    exchange: Arc<dyn CredentialExchange>,
    cached: Mutex<Option<CachedToken>>,
}

impl TokenCache {
    pub fn new(exchange: Arc<dyn CredentialExchange>) -> Self {
        Self {
            exchange,
            cached: Mutex::new(None),
        }
    }

    pub async fn get_token(&self) -> Result<String, AuthError> {
        self.get_token_at(Utc::now()).await
    }

    /// Same as [`get_token`](Self::get_token) with an explicit clock.
    pub async fn get_token_at(&self, now: DateTime<Utc>) -> Result<String, AuthError> {
        {
            let cached = self.cached.lock().unwrap_or_else(|e| e.into_inner());
            if let Some(entry) = cached.as_ref().filter(|c| c.is_fresh(now)) {
                debug!("Using cached gateway token");
                return Ok(entry.token.clone());
            }
        }

        let issued = self.exchange.exchange().await?;
        let lifetime = issued
            .expires_in
            .unwrap_or(DEFAULT_EXPIRES_IN_SECS)
            .min(MAX_EXPIRES_IN_SECS);
        let entry = CachedToken {
            token: issued.access_token,
            expires_at: expiry(now, lifetime),
        };
        info!(expires_in = lifetime, "Obtained gateway token");

        let token = entry.token.clone();
        *self.cached.lock().unwrap_or_else(|e| e.into_inner()) = Some(entry);
        Ok(token)
    }
}

/// `now + lifetime`, or `now + DEFAULT_EXPIRES_IN_SECS` if that overflows.
fn expiry(now: DateTime<Utc>, lifetime: u64) -> DateTime<Utc> {
    [lifetime, DEFAULT_EXPIRES_IN_SECS]
        .into_iter()
        .filter_map(|secs| i64::try_from(secs).ok())
        .filter_map(Duration::try_seconds)
        .find_map(|d| now.checked_add_signed(d))
        .unwrap_or(now)
}
