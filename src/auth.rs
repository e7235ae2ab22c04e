//! OAuth2 access-token lifecycle for the Dropbox API.

use std::sync::Arc;
use std::time::{Duration, SystemTime};

use reqwest::Client;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::error::{LinkError, Result};
use crate::models::TokenResponse;

/// A cached token is reused only while it has at least this long to live.
const REFRESH_MARGIN: Duration = Duration::from_secs(5 * 60);

/// Cached access token with expiration.
#[derive(Clone)]
struct CachedToken {
    access_token: String,
    expires_at: SystemTime,
}

impl CachedToken {
    fn is_fresh(&self, now: SystemTime) -> bool {
        self.expires_at > now + REFRESH_MARGIN
    }
}

/// Refresh-token credentials.
#[derive(Clone)]
struct OAuthCredentials {
    app_key: Option<String>,
    app_secret: Option<String>,
    refresh_token: Option<String>,
}

/// Hands out valid access tokens, refreshing them through the OAuth
/// endpoint as they approach expiry.
///
/// Clones share the same token cache.
#[derive(Clone)]
pub struct TokenManager {
    credentials: Arc<OAuthCredentials>,
    legacy_token: Option<String>,
    auth_url: String,
    client: Client,
    cached_token: Arc<RwLock<Option<CachedToken>>>,
}

impl TokenManager {
    /// Create a token manager from configuration.
    pub fn new(config: &Config, client: Client) -> Self {
        Self {
            credentials: Arc::new(OAuthCredentials {
                app_key: config.app_key.clone(),
                app_secret: config.app_secret.clone(),
                refresh_token: config.refresh_token.clone(),
            }),
            legacy_token: config.access_token.clone(),
            auth_url: config.auth_url.clone(),
            client,
            cached_token: Arc::new(RwLock::new(None)),
        }
    }

    /// Get a valid access token, refreshing if necessary.
    pub async fn get_access_token(&self) -> Result<String> {
        if self.credentials.refresh_token.is_none() {
            if let Some(token) = &self.legacy_token {
                debug!("Using legacy access token (no refresh token configured)");
                return Ok(token.clone());
            }
        }

        {
            let cached = self.cached_token.read().await;
            if let Some(token) = cached.as_ref() {
                if token.is_fresh(SystemTime::now()) {
                    return Ok(token.access_token.clone());
                }
            }
        }

        let mut cached = self.cached_token.write().await;

        // Another caller may have refreshed while we waited for the lock.
        if let Some(token) = cached.as_ref() {
            if token.is_fresh(SystemTime::now()) {
                return Ok(token.access_token.clone());
            }
        }

        let new_token = self.refresh_token().await?;
        *cached = Some(new_token.clone());

        Ok(new_token.access_token)
    }

    /// Drop the cached token if it is still the one the remote rejected.
    ///
    /// The next `get_access_token` call then performs a fresh refresh. If a
    /// concurrent caller already replaced the token, the newer one is kept.
    pub async fn invalidate(&self, rejected: &str) {
        let mut cached = self.cached_token.write().await;
        if cached
            .as_ref()
            .is_some_and(|token| token.access_token == rejected)
        {
            warn!("Access token rejected as expired, forcing refresh");
            *cached = None;
        }
    }

    /// Exchange the refresh token for a new access token.
    async fn refresh_token(&self) -> Result<CachedToken> {
        let creds = &self.credentials;
        let (app_key, app_secret, refresh_token) = match (
            creds.app_key.as_deref(),
            creds.app_secret.as_deref(),
            creds.refresh_token.as_deref(),
        ) {
            (Some(key), Some(secret), Some(refresh)) => (key, secret, refresh),
            _ => {
                return Err(LinkError::AuthConfig(
                    "set DROPBOX_APP_KEY, DROPBOX_APP_SECRET and DROPBOX_REFRESH_TOKEN".to_string(),
                ))
            }
        };

        info!("Refreshing access token");

        let params = [
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token),
            ("client_id", app_key),
            ("client_secret", app_secret),
        ];

        let requested_at = SystemTime::now();
        let response = self.client.post(&self.auth_url).form(&params).send().await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(LinkError::AuthRefresh { status, body });
        }

        let token_response: TokenResponse = response.json().await?;
        let lifetime = Duration::from_secs(token_response.expires_in);
        if lifetime <= REFRESH_MARGIN {
            warn!(
                expires_in = token_response.expires_in,
                "Refreshed token expires within the refresh margin, it will be refreshed on every call"
            );
        } else {
            info!(
                expires_in = token_response.expires_in,
                "Access token refreshed"
            );
        }

        Ok(CachedToken {
            access_token: token_response.access_token,
            expires_at: requested_at + lifetime,
        })
    }

    #[cfg(test)]
    pub(crate) async fn seed(&self, access_token: &str, expires_in: Duration) {
        *self.cached_token.write().await = Some(CachedToken {
            access_token: access_token.to_string(),
            expires_at: SystemTime::now() + expires_in,
        });
    }
}
