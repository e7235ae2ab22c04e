//! Batched, idempotent shared-link creation.

use futures::future::join_all;
use tracing::{debug, error, info};

use crate::client::DropboxClient;
use crate::error::Result;
use crate::listing::LinkIndex;
use crate::models::{FileEntry, MediaFile};
use crate::url_parser::direct_url;

/// Outcome of link materialization for a set of files.
#[derive(Debug, Default)]
pub struct Materialized {
    /// One entry per input file, unresolved ones with an empty URL.
    pub files: Vec<MediaFile>,
}

impl Materialized {
    /// Files that obtained a link.
    pub fn successful(&self) -> Vec<MediaFile> {
        self.files.iter().filter(|f| f.is_resolved()).cloned().collect()
    }

    pub fn into_successful(self) -> Vec<MediaFile> {
        self.files.into_iter().filter(MediaFile::is_resolved).collect()
    }

    pub fn failed_count(&self) -> usize {
        self.files.iter().filter(|f| !f.is_resolved()).count()
    }
}

/// Attach a direct link to every file.
///
/// Files already in `index` reuse the indexed URL. The rest are linked in
/// batches of `batch_size` concurrent requests; a batch is fully settled,
/// fallbacks included, before the next one starts. Per-file failures are
/// recorded as entries with an empty URL and never abort the call, except
/// for auth and cancellation errors: the first of those ends the call once
/// its batch has settled, and no later batch is started.
pub async fn materialize_links(
    client: &DropboxClient,
    files: &[FileEntry],
    index: &LinkIndex,
    batch_size: usize,
) -> Result<Materialized> {
    let (already_linked, needs_link): (Vec<&FileEntry>, Vec<&FileEntry>) =
        files.iter().partition(|f| index.contains_key(&f.path));

    info!(
        existing = already_linked.len(),
        needed = needs_link.len(),
        "Partitioned files by existing links"
    );

    let mut out: Vec<MediaFile> = already_linked
        .into_iter()
        .map(|f| MediaFile::new(f, index[&f.path].clone()))
        .collect();

    let batch_size = batch_size.max(1);
    let batch_count = needs_link.len().div_ceil(batch_size);

    for (n, batch) in needs_link.chunks(batch_size).enumerate() {
        debug!(batch = n + 1, of = batch_count, "Creating links for batch");

        let results = join_all(batch.iter().map(|f| link_with_retry(client, f))).await;

        for (file, result) in batch.iter().zip(results) {
            let url = match result {
                Ok(url) => url,
                Err(err) if err.is_fatal_passthrough() => {
                    error!(batch = n + 1, file = %file.name, error = %err, "Aborting link creation");
                    return Err(err);
                }
                Err(err) => {
                    error!(file = %file.name, error = %err, "Failed to create link");
                    String::new()
                }
            };
            out.push(MediaFile::new(file, url));
        }
    }

    let result = Materialized { files: out };
    info!(
        resolved = result.files.len() - result.failed_count(),
        total = result.files.len(),
        "Materialized direct links"
    );
    Ok(result)
}

/// Create-with-fallback, attempted a second time if the first try fails
/// for a reason other than auth or cancellation.
async fn link_with_retry(client: &DropboxClient, file: &FileEntry) -> Result<String> {
    match create_link(client, file).await {
        Err(err) if !err.is_fatal_passthrough() => {
            debug!(file = %file.name, error = %err, "Retrying link creation");
            create_link(client, file).await
        }
        other => other,
    }
}

/// Create a link, falling back to the existing one when the remote says it
/// already exists.
pub async fn create_link(client: &DropboxClient, file: &FileEntry) -> Result<String> {
    match client.create_shared_link(&file.path_display).await {
        Ok(url) => Ok(direct_url(&url)),
        Err(err) if err.is_link_already_exists() => {
            debug!(file = %file.name, "Link already exists, looking it up");
            let existing = client.list_shared_links_for_path(&file.path_display).await?;
            existing
                .links
                .first()
                .map(|link| direct_url(&link.url))
                .ok_or(err)
        }
        Err(err) => Err(err),
    }
}
