//! Dropbox API client for shared-folder and shared-link operations.

use reqwest::Client;
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::auth::TokenManager;
use crate::config::Config;
use crate::error::{LinkError, Result};
use crate::models::{
    Account, ApiErrorResponse, FolderListResponse, FolderRef, ListFolderResponse, MountResponse,
    SharedLinkListResponse, SharedLinkMetadata,
};

/// Thin RPC client over the Dropbox API v2.
///
/// Every call goes through [`DropboxClient::rpc`], which attaches a bearer
/// token and retries once with a fresh token when the remote reports it
/// expired.
pub struct DropboxClient {
    config: Config,
    auth: TokenManager,
    http: Client,
}

impl DropboxClient {
    /// Create a new client from configuration.
    pub fn new(config: Config) -> Result<Self> {
        let config = config.normalized();
        let http = Client::builder()
            .timeout(config.request_timeout())
            .build()?;
        let auth = TokenManager::new(&config, http.clone());

        Ok(Self { config, auth, http })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn auth(&self) -> &TokenManager {
        &self.auth
    }

    /// Call an RPC endpoint, retrying once on an expired token.
    pub async fn rpc<T: DeserializeOwned>(&self, endpoint: &str, body: &Value) -> Result<T> {
        let token = self.auth.get_access_token().await?;

        let text = match self.send(endpoint, body, &token).await {
            Err(err) if err.is_expired_token() => {
                self.auth.invalidate(&token).await;
                let token = self.auth.get_access_token().await?;
                self.send(endpoint, body, &token).await?
            }
            other => other?,
        };

        // Endpoints without a result return an empty body or `null`.
        if text.trim().is_empty() {
            return Ok(serde_json::from_str("null")?);
        }
        Ok(serde_json::from_str(&text)?)
    }

    async fn send(&self, endpoint: &str, body: &Value, token: &str) -> Result<String> {
        let url = format!("{}/{}", self.config.api_base, endpoint);
        debug!(endpoint, "Dropbox RPC");

        let response = self
            .http
            .post(&url)
            .bearer_auth(token)
            .json(body)
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await.unwrap_or_default();

        if !status.is_success() {
            let message = match serde_json::from_str::<ApiErrorResponse>(&text) {
                Ok(api_error) => api_error.error_summary,
                Err(_) => text,
            };
            return Err(LinkError::ApiError {
                status: status.as_u16(),
                message,
            });
        }

        Ok(text)
    }

    /// Email address of the account the API credentials belong to.
    pub async fn get_current_account(&self) -> Result<Account> {
        self.rpc("users/get_current_account", &Value::Null).await
    }

    /// Resolve a shared URL to its metadata (folder name).
    pub async fn get_shared_link_metadata(&self, url: &str) -> Result<SharedLinkMetadata> {
        self.rpc("sharing/get_shared_link_metadata", &json!({ "url": url }))
            .await
    }

    /// First page of shared folders the account is a member of.
    pub async fn list_folders(&self) -> Result<Vec<FolderRef>> {
        let body = json!({ "limit": self.config.folder_page_size });
        let response: FolderListResponse = self.rpc("sharing/list_folders", &body).await?;
        Ok(response.entries)
    }

    /// First page of shared folders the account was invited to but has not mounted.
    pub async fn list_mountable_folders(&self) -> Result<Vec<FolderRef>> {
        let body = json!({ "limit": self.config.folder_page_size });
        let response: FolderListResponse =
            self.rpc("sharing/list_mountable_folders", &body).await?;
        Ok(response.entries)
    }

    /// Mount a shared folder and return its path in the account namespace.
    pub async fn mount_folder(&self, shared_folder_id: &str) -> Result<String> {
        let body = json!({ "shared_folder_id": shared_folder_id });
        let response: MountResponse = self.rpc("sharing/mount_folder", &body).await?;

        response.path_lower.ok_or_else(|| LinkError::ApiError {
            status: 200,
            message: "mount_folder response has no path".to_string(),
        })
    }

    pub async fn unmount_folder(&self, shared_folder_id: &str) -> Result<()> {
        let body = json!({ "shared_folder_id": shared_folder_id });
        let _: Value = self.rpc("sharing/unmount_folder", &body).await?;
        Ok(())
    }

    /// First page of a folder listing.
    pub async fn list_folder(&self, path: &str) -> Result<ListFolderResponse> {
        let body = json!({
            "path": path,
            "recursive": self.config.recursive,
            "limit": self.config.list_limit,
            "include_deleted": false,
        });
        self.rpc("files/list_folder", &body).await
    }

    pub async fn list_folder_continue(&self, cursor: &str) -> Result<ListFolderResponse> {
        self.rpc("files/list_folder/continue", &json!({ "cursor": cursor }))
            .await
    }

    /// Create a public shared link for a path and return the raw URL.
    pub async fn create_shared_link(&self, path: &str) -> Result<String> {
        #[derive(serde::Deserialize)]
        struct CreateLinkResponse {
            url: String,
        }

        let body = json!({
            "path": path,
            "settings": { "requested_visibility": "public" },
        });
        let response: CreateLinkResponse = self
            .rpc("sharing/create_shared_link_with_settings", &body)
            .await?;
        Ok(response.url)
    }

    /// One page of the account-wide shared link listing.
    pub async fn list_shared_links(&self, cursor: Option<&str>) -> Result<SharedLinkListResponse> {
        let body = match cursor {
            Some(cursor) => json!({ "cursor": cursor }),
            None => json!({}),
        };
        self.rpc("sharing/list_shared_links", &body).await
    }

    /// Existing direct links for exactly one path.
    pub async fn list_shared_links_for_path(&self, path: &str) -> Result<SharedLinkListResponse> {
        let body = json!({ "path": path, "direct_only": true });
        let response: SharedLinkListResponse = self.rpc("sharing/list_shared_links", &body).await?;
        if response.links.is_empty() {
            warn!(path, "No existing shared link found for path");
        }
        Ok(response)
    }
}
