//! Shared-link URL validation and direct-link normalization.

use regex::Regex;
use std::sync::LazyLock;

use crate::error::{LinkError, Result};

/// Dropbox sharing URLs (`/s/`, `/sh/`, `/scl/fi/`, `/scl/fo/`).
static SHARED_URL_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^https?://(?:www\.)?dropbox\.com/(?:s|sh|scl/fi|scl/fo)/[a-zA-Z0-9_\-/.%+~]+")
        .expect("Invalid shared URL regex")
});

/// Host serving the HTML preview page.
const SHARING_HOST: &str = "www.dropbox.com";

/// Host serving raw file bytes.
const DIRECT_HOST: &str = "dl.dropboxusercontent.com";

/// Validate a user-supplied shared folder reference.
///
/// Returns the trimmed URL.
///
/// # Examples
///
/// ```
/// use folder_links::url_parser::validate_shared_url;
///
/// let url = validate_shared_url(" https://www.dropbox.com/scl/fo/abc123/xyz?dl=0 ").unwrap();
/// assert_eq!(url, "https://www.dropbox.com/scl/fo/abc123/xyz?dl=0");
///
/// assert!(validate_shared_url("https://example.com/folder").is_err());
/// ```
pub fn validate_shared_url(url: &str) -> Result<String> {
    let trimmed = url.trim();

    if SHARED_URL_REGEX.is_match(trimmed) {
        return Ok(trimmed.to_string());
    }

    Err(LinkError::InvalidSharedUrl(url.to_string()))
}

/// Rewrite a sharing URL into its direct-content form.
///
/// Swaps the preview host for the content host and turns `dl=0` into
/// `dl=1`. URLs on other hosts pass through with only the flag rewritten.
///
/// ```
/// use folder_links::url_parser::direct_url;
///
/// assert_eq!(
///     direct_url("https://www.dropbox.com/scl/fi/abc/a.mp4?rlkey=k&dl=0"),
///     "https://dl.dropboxusercontent.com/scl/fi/abc/a.mp4?rlkey=k&dl=1"
/// );
/// ```
pub fn direct_url(url: &str) -> String {
    url.replacen(SHARING_HOST, DIRECT_HOST, 1).replace("dl=0", "dl=1")
}
