//! Shared-link to mounted-folder-path resolution.

use tracing::info;

use crate::client::DropboxClient;
use crate::error::{LinkError, Result};
use crate::models::FolderRef;

/// A shared folder located in the account namespace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedPath {
    /// Canonical folder name from the shared link metadata.
    pub name: String,
    /// Mounted path, usable with `files/list_folder`.
    pub path: String,
}

/// Resolve a shared folder URL to its name and a listable path.
///
/// Looks the name up among the folders the account already shares, then
/// among the pending invitations, mounting the folder when it has no path
/// yet. Names match case-insensitively; the first match in listing order
/// wins.
pub async fn resolve_folder_path(client: &DropboxClient, shared_url: &str) -> Result<ResolvedPath> {
    let name = client
        .get_shared_link_metadata(shared_url)
        .await
        .map_err(|e| e.into_stage(LinkError::LinkMetadata))?
        .name;

    let mounted = client
        .list_folders()
        .await
        .map_err(|e| e.into_stage(LinkError::Listing))?;

    if let Some(folder) = find_by_name(mounted, &name) {
        let path = match folder.mounted_path {
            Some(path) => path,
            None => mount(client, &folder).await?,
        };
        return Ok(ResolvedPath { name, path });
    }

    let mountable = client
        .list_mountable_folders()
        .await
        .map_err(|e| e.into_stage(LinkError::Listing))?;

    match find_by_name(mountable, &name) {
        Some(folder) => {
            let path = mount(client, &folder).await?;
            Ok(ResolvedPath { name, path })
        }
        None => Err(LinkError::FolderNotFound(name)),
    }
}

fn find_by_name(folders: Vec<FolderRef>, name: &str) -> Option<FolderRef> {
    folders.into_iter().find(|folder| folder.matches_name(name))
}

async fn mount(client: &DropboxClient, folder: &FolderRef) -> Result<String> {
    info!(folder = %folder.name, "Mounting shared folder");

    client
        .mount_folder(&folder.remote_id)
        .await
        .map_err(|e| {
            e.into_stage(|message| LinkError::Mount {
                folder: folder.name.clone(),
                message,
            })
        })
}
