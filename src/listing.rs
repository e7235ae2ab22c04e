//! Cursor-paginated enumeration of folder contents and existing shared links.

use std::collections::HashMap;

use tracing::{debug, info};

use crate::client::DropboxClient;
use crate::error::{LinkError, Result};
use crate::models::{FileEntry, ListEntry};
use crate::url_parser::direct_url;

/// Existing direct links keyed by lowercased file path.
pub type LinkIndex = HashMap<String, String>;

/// List every file under `path`, following continuation cursors to the end.
///
/// Folders and deleted entries are skipped. A failure on any page aborts
/// the whole enumeration; partial listings are never returned.
pub async fn list_all_files(client: &DropboxClient, path: &str) -> Result<Vec<FileEntry>> {
    let mut files = Vec::new();

    let mut page = client
        .list_folder(path)
        .await
        .map_err(|e| e.into_stage(LinkError::Listing))?;

    loop {
        files.extend(page.entries.into_iter().filter_map(ListEntry::into_file));

        if !page.has_more {
            break;
        }

        debug!(files = files.len(), "Continuing folder listing");
        page = client
            .list_folder_continue(&page.cursor)
            .await
            .map_err(|e| e.into_stage(LinkError::Listing))?;
    }

    Ok(files)
}

/// Build a path -> direct URL map of every shared link on the account.
///
/// Only an optimization: files missing from the index simply get a link
/// created for them. Rebuilt on every resolution, never cached.
pub async fn build_link_index(client: &DropboxClient) -> Result<LinkIndex> {
    let mut index = LinkIndex::new();
    let mut cursor: Option<String> = None;

    loop {
        let page = client
            .list_shared_links(cursor.as_deref())
            .await
            .map_err(|e| e.into_stage(LinkError::Listing))?;

        for link in page.links {
            if let Some(path) = link.path_lower {
                index.insert(path, direct_url(&link.url));
            }
        }

        match page.cursor {
            Some(next) if page.has_more => cursor = Some(next),
            _ => break,
        }
    }

    info!(links = index.len(), "Found existing shared links");
    Ok(index)
}
