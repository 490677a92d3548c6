pub mod api; // Gallery web app
pub mod config;
pub mod gallery; // Blob storage, thumbnails, vision captions
pub mod sentiment; // Review sentiment classifier

use std::sync::Arc;

use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::EnvFilter;

/// Initialise tracing once per process, logging to stdout; `RUST_LOG`
/// overrides the default filter.
pub fn init_tracing() {
    init_tracing_with_writer(std::io::stdout);
}

/// As [`init_tracing`], but log lines go to `writer`. Command-line tools
/// whose stdout is their output pass `std::io::stderr`.
pub fn init_tracing_with_writer<W>(writer: W)
where
    W: for<'a> MakeWriter<'a> + Send + Sync + 'static,
{
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config::default_log_filter())),
        )
        .with_writer(writer)
        .init();
}

#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    #[error(transparent)]
    Config(#[from] config::ConfigError),
    #[error(transparent)]
    Blob(#[from] gallery::BlobError),
    #[error(transparent)]
    Vision(#[from] gallery::VisionError),
    #[error(transparent)]
    Server(#[from] api::ServerError),
    #[error("Cannot create data directory {path}: {source}")]
    DataDir {
        path: std::path::PathBuf,
        source: std::io::Error,
    },
}

/// Wire storage and vision from settings into the web app context.
pub fn build_context(settings: &config::GallerySettings) -> Result<api::ApiContext, StartupError> {
    let (store, blob_root) = match &settings.storage {
        config::StorageSettings::Azure { connection_string } => {
            tracing::info!("Using Azure blob storage");
            let store: Arc<dyn gallery::BlobStore> =
                Arc::new(gallery::AzureBlobStore::from_connection_string(connection_string)?);
            (store, None)
        }
        config::StorageSettings::Local { root } => {
            std::fs::create_dir_all(root).map_err(|source| StartupError::DataDir {
                path: root.clone(),
                source,
            })?;
            tracing::info!(root = %root.display(), "Using local blob storage");
            let store: Arc<dyn gallery::BlobStore> =
                Arc::new(gallery::LocalBlobStore::new(root.clone(), &settings.base_url()));
            (store, Some(root.clone()))
        }
    };

    let vision: Arc<dyn gallery::VisionClient> = match &settings.vision {
        Some(vision) => Arc::new(gallery::AzureVisionClient::new(&vision.endpoint, &vision.key)?),
        None => {
            tracing::warn!("Computer Vision is not configured; uploads will not be captioned");
            Arc::new(gallery::vision::DisabledVision)
        }
    };

    let gallery = Arc::new(gallery::GalleryService::new(store, vision));
    let ctx = api::ApiContext::new(gallery, settings.max_upload_bytes);
    Ok(match blob_root {
        Some(root) => ctx.with_blob_root(root),
        None => ctx,
    })
}

/// Start the gallery web app and serve until Ctrl-C.
pub async fn run() -> Result<(), StartupError> {
    tracing::info!("{} starting v{}", config::APP_NAME, config::APP_VERSION);

    let settings = config::GallerySettings::from_env()?;
    let ctx = build_context(&settings)?;

    if let Err(e) = ctx.gallery.prepare().await {
        tracing::warn!(error = %e, "Could not prepare blob containers; continuing");
    }

    let server = api::start_gallery_server(ctx, settings.bind).await?;
    tracing::info!(url = %settings.base_url(), "Gallery ready");

    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for Ctrl-C: {e}");
    }
    server.stop().await;
    Ok(())
}
