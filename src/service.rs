//! Entry points: folder resolution and quota reclamation.

use std::future::Future;

use tokio::sync::OnceCell;
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument};

use crate::client::DropboxClient;
use crate::config::Config;
use crate::error::{LinkError, Result};
use crate::listing::{build_link_index, list_all_files};
use crate::materialize::materialize_links;
use crate::models::{FolderInfo, MediaType, ResolvedFolder};
use crate::reclaim::unmount_all;
use crate::resolver::resolve_folder_path;
use crate::url_parser::validate_shared_url;

/// Turns shared folder URLs into lists of direct media links.
///
/// The token cache lives inside the client and is shared by every call;
/// nothing else persists between calls.
pub struct FolderLinkService {
    client: DropboxClient,
    account_email: OnceCell<String>,
}

impl FolderLinkService {
    pub fn new(config: Config) -> Result<Self> {
        Ok(Self::with_client(DropboxClient::new(config)?))
    }

    pub fn with_client(client: DropboxClient) -> Self {
        Self {
            client,
            account_email: OnceCell::new(),
        }
    }

    pub fn client(&self) -> &DropboxClient {
        &self.client
    }

    /// Resolve a shared folder URL into its successfully linked files.
    pub async fn resolve_folder(&self, shared_url: &str) -> Result<ResolvedFolder> {
        self.resolve_folder_with_cancel(shared_url, &CancellationToken::new())
            .await
    }

    /// Like [`resolve_folder`](Self::resolve_folder), aborting with
    /// [`LinkError::Cancelled`] as soon as `cancel` fires.
    #[instrument(skip(self, cancel))]
    pub async fn resolve_folder_with_cancel(
        &self,
        shared_url: &str,
        cancel: &CancellationToken,
    ) -> Result<ResolvedFolder> {
        let shared_url = validate_shared_url(shared_url)?;
        let client = &self.client;
        let config = client.config();

        // Fail on missing credentials before any network call.
        cancellable(cancel, client.auth().get_access_token()).await?;

        let resolved = cancellable(cancel, resolve_folder_path(client, &shared_url)).await?;
        info!(folder = %resolved.name, path = %resolved.path, "Resolved shared folder");

        let mut files = cancellable(cancel, list_all_files(client, &resolved.path)).await?;
        if config.media_only {
            files.retain(|f| MediaType::from_name(&f.name).is_media());
        }
        info!(files = files.len(), folder = %resolved.name, "Enumerated files");

        let index = cancellable(cancel, build_link_index(client)).await?;

        let materialized = cancellable(
            cancel,
            materialize_links(client, &files, &index, config.batch_size),
        )
        .await?;

        Ok(ResolvedFolder::new(
            resolved.name,
            materialized.into_successful(),
        ))
    }

    /// Folder name and file counts for a shared folder URL.
    pub async fn folder_info(&self, shared_url: &str) -> Result<FolderInfo> {
        let shared_url = validate_shared_url(shared_url)?;
        let resolved = resolve_folder_path(&self.client, &shared_url).await?;
        let files = list_all_files(&self.client, &resolved.path).await?;

        Ok(FolderInfo::from_files(resolved.name, &files))
    }

    /// Email of the API account, which users must invite to their folders.
    pub async fn account_email(&self) -> Result<String> {
        self.account_email
            .get_or_try_init(|| async {
                let account = self.client.get_current_account().await?;
                Ok::<_, LinkError>(account.email)
            })
            .await
            .cloned()
    }

    /// Unmount all mounted folders to free mount slots.
    pub async fn reclaim_quota(&self) -> Result<usize> {
        unmount_all(&self.client).await
    }
}

async fn cancellable<T, F>(cancel: &CancellationToken, fut: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(LinkError::Cancelled),
        result = fut => result,
    }
}
