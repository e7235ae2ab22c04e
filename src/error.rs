//! Error types for the folder_links crate.

use thiserror::Error;

/// Remote error code for an access token that is no longer valid.
const EXPIRED_TOKEN_CODE: &str = "expired_access_token";

/// Remote error code returned when a shared link for the path already exists.
const LINK_EXISTS_CODE: &str = "shared_link_already_exists";

/// Errors that can occur while resolving a shared folder into direct links.
#[derive(Error, Debug)]
pub enum LinkError {
    #[error("Missing OAuth credentials: {0}")]
    AuthConfig(String),

    #[error("Token refresh failed ({status}): {body}")]
    AuthRefresh { status: u16, body: String },

    #[error("Failed to read shared link metadata: {0}")]
    LinkMetadata(String),

    #[error("Folder \"{0}\" not found. Invite the API account to the folder first.")]
    FolderNotFound(String),

    #[error("Failed to mount folder \"{folder}\": {message}")]
    Mount { folder: String, message: String },

    #[error("Listing failed: {0}")]
    Listing(String),

    #[error("Operation cancelled")]
    Cancelled,

    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("API error ({status}): {message}")]
    ApiError { status: u16, message: String },

    #[error("Failed to read config file: {0}")]
    ConfigFileError(#[from] std::io::Error),

    #[error("Failed to parse JSON: {0}")]
    ParseError(#[from] serde_json::Error),

    #[error("Invalid shared folder URL: {0}")]
    InvalidSharedUrl(String),
}

impl LinkError {
    /// The remote rejected the bearer token as expired.
    pub fn is_expired_token(&self) -> bool {
        matches!(self, LinkError::ApiError { message, .. } if message.contains(EXPIRED_TOKEN_CODE))
    }

    /// The remote refused to create a link because one already exists.
    pub fn is_link_already_exists(&self) -> bool {
        matches!(self, LinkError::ApiError { message, .. } if message.contains(LINK_EXISTS_CODE))
    }

    /// Errors that terminate a call regardless of which stage raised them.
    pub fn is_fatal_passthrough(&self) -> bool {
        matches!(
            self,
            LinkError::AuthConfig(_) | LinkError::AuthRefresh { .. } | LinkError::Cancelled
        )
    }

    /// Convert a generic remote failure into the category of the stage it
    /// happened in. Auth and cancellation errors keep their own category.
    pub(crate) fn into_stage<F>(self, stage: F) -> LinkError
    where
        F: FnOnce(String) -> LinkError,
    {
        if self.is_fatal_passthrough() {
            self
        } else {
            stage(self.to_string())
        }
    }
}

/// Result type alias for LinkError.
pub type Result<T> = std::result::Result<T, LinkError>;
