//! Data models for Dropbox API responses and resolved results.

use serde::{Deserialize, Serialize};

/// Extensions classified as video (lowercase, with dot).
pub const VIDEO_EXTENSIONS: &[&str] = &[".mp4", ".mov", ".avi", ".mkv", ".webm"];

/// Extensions classified as image (lowercase, with dot).
pub const IMAGE_EXTENSIONS: &[&str] = &[".jpg", ".jpeg", ".png", ".gif", ".webp"];

/// Display class of a resolved file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MediaType {
    Video,
    Image,
    File,
}

impl MediaType {
    /// Classify a file by the extension of its name.
    pub fn from_name(name: &str) -> Self {
        let lower = name.to_lowercase();
        if VIDEO_EXTENSIONS.iter().any(|ext| lower.ends_with(ext)) {
            MediaType::Video
        } else if IMAGE_EXTENSIONS.iter().any(|ext| lower.ends_with(ext)) {
            MediaType::Image
        } else {
            MediaType::File
        }
    }

    pub fn is_media(self) -> bool {
        !matches!(self, MediaType::File)
    }
}

impl std::fmt::Display for MediaType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            MediaType::Video => "Video",
            MediaType::Image => "Image",
            MediaType::File => "File",
        };
        f.write_str(label)
    }
}

/// A leaf file under a resolved folder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileEntry {
    pub id: String,
    pub name: String,
    /// Lowercased path, the key used by the existing-link index.
    pub path: String,
    /// Display-cased path, sent when creating links.
    pub path_display: String,
}

/// One file of the result set, ready for the review UI.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaFile {
    #[serde(rename = "type")]
    pub kind: MediaType,
    pub id: String,
    /// Empty when no link could be materialized.
    pub url: String,
    pub name: String,
    pub accepted: bool,
}

impl MediaFile {
    pub fn new(file: &FileEntry, url: String) -> Self {
        Self {
            kind: MediaType::from_name(&file.name),
            id: file.id.clone(),
            url,
            name: file.name.clone(),
            accepted: false,
        }
    }

    pub fn is_resolved(&self) -> bool {
        !self.url.is_empty()
    }
}

impl std::fmt::Display for MediaFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let url = if self.url.is_empty() { "-" } else { &self.url };
        write!(f, "{}\t{}\t{}\t{}", self.id, self.kind, self.name, url)
    }
}

/// Output of a single folder resolution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedFolder {
    pub order_from: String,
    pub job_code: String,
    pub files: Vec<MediaFile>,
}

impl ResolvedFolder {
    pub fn new(job_code: String, files: Vec<MediaFile>) -> Self {
        Self {
            order_from: "dropbox".to_string(),
            job_code,
            files,
        }
    }
}

/// Folder name and file counts by class.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FolderInfo {
    pub folder_name: String,
    pub file_count: usize,
    pub video_count: usize,
    pub image_count: usize,
}

impl FolderInfo {
    pub fn from_files(folder_name: String, files: &[FileEntry]) -> Self {
        let mut info = FolderInfo {
            folder_name,
            file_count: files.len(),
            ..Default::default()
        };
        for file in files {
            match MediaType::from_name(&file.name) {
                MediaType::Video => info.video_count += 1,
                MediaType::Image => info.image_count += 1,
                MediaType::File => {}
            }
        }
        info
    }
}

/// A shared folder as reported by the folder listings.
#[derive(Debug, Clone, Deserialize)]
pub struct FolderRef {
    pub name: String,
    #[serde(rename = "shared_folder_id")]
    pub remote_id: String,
    /// Absent until the folder is mounted.
    #[serde(default, rename = "path_lower")]
    pub mounted_path: Option<String>,
}

impl FolderRef {
    /// Case-insensitive, whitespace-trimmed name comparison.
    pub fn matches_name(&self, name: &str) -> bool {
        self.name.trim().to_lowercase() == name.trim().to_lowercase()
    }
}

/// Response from `sharing/list_folders` and `sharing/list_mountable_folders`.
#[derive(Debug, Deserialize)]
pub struct FolderListResponse {
    #[serde(default)]
    pub entries: Vec<FolderRef>,
}

/// Response from `sharing/mount_folder`.
#[derive(Debug, Deserialize)]
pub struct MountResponse {
    #[serde(default)]
    pub path_lower: Option<String>,
}

/// Response from `sharing/get_shared_link_metadata`.
#[derive(Debug, Deserialize)]
pub struct SharedLinkMetadata {
    pub name: String,
}

/// One entry of a `files/list_folder` page.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = ".tag", rename_all = "lowercase")]
pub enum ListEntry {
    File {
        id: String,
        name: String,
        path_lower: String,
        #[serde(default)]
        path_display: Option<String>,
    },
    Folder {
        name: String,
    },
    #[serde(other)]
    Other,
}

impl ListEntry {
    pub fn into_file(self) -> Option<FileEntry> {
        match self {
            ListEntry::File {
                id,
                name,
                path_lower,
                path_display,
            } => Some(FileEntry {
                path_display: path_display.unwrap_or_else(|| path_lower.clone()),
                id,
                name,
                path: path_lower,
            }),
            _ => None,
        }
    }
}

/// Response from `files/list_folder` and `files/list_folder/continue`.
#[derive(Debug, Deserialize)]
pub struct ListFolderResponse {
    #[serde(default)]
    pub entries: Vec<ListEntry>,
    #[serde(default)]
    pub cursor: String,
    #[serde(default)]
    pub has_more: bool,
}

/// An existing shared link.
#[derive(Debug, Clone, Deserialize)]
pub struct SharedLink {
    pub url: String,
    #[serde(default)]
    pub path_lower: Option<String>,
}

/// Response from `sharing/list_shared_links`.
#[derive(Debug, Deserialize)]
pub struct SharedLinkListResponse {
    #[serde(default)]
    pub links: Vec<SharedLink>,
    #[serde(default)]
    pub has_more: bool,
    #[serde(default)]
    pub cursor: Option<String>,
}

/// Response from `users/get_current_account`.
#[derive(Debug, Deserialize)]
pub struct Account {
    pub email: String,
}

/// Dropbox error envelope.
#[derive(Debug, Deserialize)]
pub struct ApiErrorResponse {
    pub error_summary: String,
}

/// OAuth2 token response.
#[derive(Debug, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub expires_in: u64,
}
