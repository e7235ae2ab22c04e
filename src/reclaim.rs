//! Mount-quota reclamation.

use tracing::{info, warn};

use crate::client::DropboxClient;
use crate::error::{LinkError, Result};

/// Unmount every mounted shared folder, best effort.
///
/// Individual unmount failures are logged and skipped. Returns how many
/// folders were actually unmounted.
pub async fn unmount_all(client: &DropboxClient) -> Result<usize> {
    let folders = client
        .list_folders()
        .await
        .map_err(|e| e.into_stage(LinkError::Listing))?;

    let mut count = 0;
    for folder in folders.iter().filter(|f| f.mounted_path.is_some()) {
        match client.unmount_folder(&folder.remote_id).await {
            Ok(()) => count += 1,
            Err(err) => warn!(folder = %folder.name, error = %err, "Failed to unmount folder"),
        }
    }

    info!(count, "Unmounted shared folders");
    Ok(count)
}
