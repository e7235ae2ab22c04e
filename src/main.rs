//! folder_links CLI - Resolve Dropbox shared folders into direct links.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing::warn;
use tracing_subscriber::EnvFilter;

use folder_links::{Config, FolderLinkService, LinkError};

/// CLI tool for turning Dropbox shared folders into direct media links.
#[derive(Parser)]
#[command(name = "folder_links")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Optional JSON config file; credential flags override its values.
    /// Without one, credentials are read from the environment, including
    /// the NEXT_PUBLIC_ prefixed variables.
    #[arg(long, env = "FOLDER_LINKS_CONFIG")]
    config: Option<PathBuf>,

    /// Dropbox app key.
    #[arg(long, env = "DROPBOX_APP_KEY", hide_env_values = true)]
    app_key: Option<String>,

    /// Dropbox app secret.
    #[arg(long, env = "DROPBOX_APP_SECRET", hide_env_values = true)]
    app_secret: Option<String>,

    /// OAuth refresh token.
    #[arg(long, env = "DROPBOX_REFRESH_TOKEN", hide_env_values = true)]
    refresh_token: Option<String>,

    /// Long-lived access token, used when no refresh token is set.
    #[arg(long, env = "DROPBOX_ACCESS_TOKEN", hide_env_values = true)]
    access_token: Option<String>,

    /// Concurrent link creation requests per batch.
    #[arg(long)]
    batch_size: Option<usize>,

    /// Enable debug logging.
    #[arg(long, short = 'v')]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Resolve a shared folder into direct file links.
    Resolve {
        /// Shared folder URL.
        url: String,

        /// Print the result as JSON.
        #[arg(long)]
        json: bool,

        /// Only keep video and image files.
        #[arg(long)]
        media_only: bool,
    },

    /// Show the folder name and file counts of a shared folder.
    Info {
        /// Shared folder URL.
        url: String,
    },

    /// Print the API account email to invite to shared folders.
    Email,

    /// Unmount every mounted shared folder.
    UnmountAll,
}

impl Cli {
    fn load_config(&self) -> Result<Config> {
        let mut config = match &self.config {
            Some(path) => Config::from_file(path)
                .with_context(|| format!("Failed to load config from {:?}", path))?,
            None => Config::from_env(),
        };

        if self.app_key.is_some() {
            config.app_key = self.app_key.clone();
        }
        if self.app_secret.is_some() {
            config.app_secret = self.app_secret.clone();
        }
        if self.refresh_token.is_some() {
            config.refresh_token = self.refresh_token.clone();
        }
        if self.access_token.is_some() {
            config.access_token = self.access_token.clone();
        }
        if let Some(batch_size) = self.batch_size {
            config.batch_size = batch_size;
        }

        Ok(config.normalized())
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    let mut config = cli.load_config()?;
    if !config.has_credentials() {
        warn!("No Dropbox credentials configured, remote calls will fail");
    }

    if let Commands::Resolve { media_only: true, .. } = cli.command {
        config.media_only = true;
    }

    let service = FolderLinkService::new(config).context("Failed to create Dropbox client")?;

    match cli.command {
        Commands::Resolve { url, json, .. } => {
            let cancel = CancellationToken::new();
            let on_ctrl_c = cancel.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    on_ctrl_c.cancel();
                }
            });

            let folder = match service.resolve_folder_with_cancel(&url, &cancel).await {
                Ok(folder) => folder,
                Err(LinkError::FolderNotFound(name)) => {
                    let email = service.account_email().await.unwrap_or_default();
                    anyhow::bail!(
                        "Folder \"{}\" is not shared with the API account yet. Invite {} first.",
                        name,
                        if email.is_empty() { "the API account" } else { email.as_str() }
                    );
                }
                Err(e) => {
                    return Err(e).with_context(|| format!("Failed to resolve folder: {}", url))
                }
            };

            if json {
                println!("{}", serde_json::to_string_pretty(&folder)?);
            } else if folder.files.is_empty() {
                println!("No files found in {}.", folder.job_code);
            } else {
                println!("Job: {} ({} file(s))", folder.job_code, folder.files.len());
                println!("{:<40} {:<6} {:<40} {}", "ID", "TYPE", "NAME", "URL");
                println!("{}", "-".repeat(120));
                for file in &folder.files {
                    println!("{}", file);
                }
            }
        }

        Commands::Info { url } => {
            let info = service
                .folder_info(&url)
                .await
                .with_context(|| format!("Failed to read folder info: {}", url))?;

            println!("Folder: {}", info.folder_name);
            println!("Files:  {}", info.file_count);
            println!("Videos: {}", info.video_count);
            println!("Images: {}", info.image_count);
        }

        Commands::Email => {
            let email = service
                .account_email()
                .await
                .context("Failed to read account email")?;
            println!("{}", email);
        }

        Commands::UnmountAll => {
            let count = service
                .reclaim_quota()
                .await
                .context("Failed to unmount folders")?;
            println!("Unmounted {} folder(s).", count);
        }
    }

    Ok(())
}
