//! folder_links - Resolve Dropbox shared folders into direct media links.
//!
//! This library provides functionality to:
//! - Keep a Dropbox OAuth access token fresh (refresh-token flow)
//! - Locate and mount a shared folder from its shared URL
//! - List every file in the folder and attach a direct download link to it
//! - Unmount all shared folders to reclaim mount quota
//!
//! # Example
//!
//! ```no_run
//! use folder_links::{Config, FolderLinkService};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let service = FolderLinkService::new(Config::from_env())?;
//!
//!     let folder = service
//!         .resolve_folder("https://www.dropbox.com/scl/fo/abc123/xyz?dl=0")
//!         .await?;
//!     for file in folder.files {
//!         println!("{}", file);
//!     }
//!
//!     Ok(())
//! }
//! ```

pub mod auth;
pub mod client;
pub mod config;
pub mod error;
pub mod listing;
pub mod materialize;
pub mod models;
pub mod reclaim;
pub mod resolver;
pub mod service;
pub mod url_parser;

// Re-exports for convenience
pub use auth::TokenManager;
pub use client::DropboxClient;
pub use config::Config;
pub use error::{LinkError, Result};
pub use models::{FolderInfo, MediaFile, MediaType, ResolvedFolder};
pub use service::FolderLinkService;
pub use url_parser::{direct_url, validate_shared_url};
