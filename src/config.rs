//! Runtime configuration for the Dropbox link resolver.

use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::error::Result;

/// Dropbox API v2 RPC base URL.
pub const DEFAULT_API_BASE: &str = "https://api.dropboxapi.com/2";

/// Dropbox OAuth2 token endpoint.
pub const DEFAULT_AUTH_URL: &str = "https://api.dropboxapi.com/oauth2/token";

/// Link creation requests issued concurrently per batch.
pub const DEFAULT_BATCH_SIZE: usize = 15;

/// Page size for the shared/mountable folder listings.
pub const DEFAULT_FOLDER_PAGE_SIZE: u32 = 100;

/// Page size cap for `files/list_folder` (Dropbox maximum).
pub const DEFAULT_LIST_LIMIT: u32 = 2000;

const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

/// Credentials, endpoints and tuning knobs.
///
/// Every field has a default, so a config file only needs the values it
/// wants to override. Empty strings are treated as "not configured".
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    pub app_key: Option<String>,
    pub app_secret: Option<String>,
    pub refresh_token: Option<String>,
    /// Long-lived legacy token, used only when no refresh token is set.
    pub access_token: Option<String>,
    pub api_base: String,
    pub auth_url: String,
    pub batch_size: usize,
    pub folder_page_size: u32,
    pub list_limit: u32,
    pub recursive: bool,
    /// Skip files that are neither video nor image.
    pub media_only: bool,
    pub request_timeout_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            app_key: None,
            app_secret: None,
            refresh_token: None,
            access_token: None,
            api_base: DEFAULT_API_BASE.to_string(),
            auth_url: DEFAULT_AUTH_URL.to_string(),
            batch_size: DEFAULT_BATCH_SIZE,
            folder_page_size: DEFAULT_FOLDER_PAGE_SIZE,
            list_limit: DEFAULT_LIST_LIMIT,
            recursive: true,
            media_only: false,
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
        }
    }
}

impl Config {
    /// Load configuration from a JSON file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&content)?;
        Ok(config.normalized())
    }

    /// Build configuration from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build configuration from a variable lookup. The plain `DROPBOX_*`
    /// names take precedence over their `NEXT_PUBLIC_` variants.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        Self {
            app_key: first_set(&lookup, &["DROPBOX_APP_KEY", "NEXT_PUBLIC_DROPBOX_APP_KEY"]),
            app_secret: first_set(&lookup, &["DROPBOX_APP_SECRET"]),
            refresh_token: first_set(&lookup, &["DROPBOX_REFRESH_TOKEN"]),
            access_token: first_set(
                &lookup,
                &["DROPBOX_ACCESS_TOKEN", "NEXT_PUBLIC_DROPBOX_ACCESS_TOKEN"],
            ),
            ..Self::default()
        }
        .normalized()
    }

    /// Drop empty credentials, clamp sizes and strip trailing slashes.
    pub fn normalized(mut self) -> Self {
        self.app_key = non_empty(self.app_key);
        self.app_secret = non_empty(self.app_secret);
        self.refresh_token = non_empty(self.refresh_token);
        self.access_token = non_empty(self.access_token);
        self.api_base = self.api_base.trim_end_matches('/').to_string();
        self.batch_size = self.batch_size.max(1);
        self.folder_page_size = self.folder_page_size.max(1);
        self.list_limit = self.list_limit.max(1);
        self
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Whether any usable credential is present at all.
    pub fn has_credentials(&self) -> bool {
        self.access_token.is_some() || self.refresh_token.is_some()
    }
}

fn first_set<F>(lookup: &F, names: &[&str]) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    names
        .iter()
        .filter_map(|name| lookup(*name))
        .find(|value| !value.trim().is_empty())
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
