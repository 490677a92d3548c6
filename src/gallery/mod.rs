//! Intellipix gallery: uploads land in blob storage, get a thumbnail and a
//! computer-vision caption, and are found again by keyword.

pub mod azure_store;
pub mod blob;
pub mod local_store;
pub mod search;
pub mod service;
pub mod thumbnail;
pub mod vision;

pub use azure_store::AzureBlobStore;
pub use blob::{BlobError, BlobItem, BlobStore};
pub use local_store::LocalBlobStore;
pub use search::BlobData;
pub use service::{GalleryService, ImageUpload, UploadOutcome};
pub use thumbnail::{make_thumbnail, Thumbnail, ThumbnailError};
pub use vision::{AzureVisionClient, ImageDescription, VisionClient, VisionError};

use thiserror::Error;

/// Metadata key holding the first vision caption.
pub const CAPTION_KEY: &str = "Caption";
/// Metadata key holding the `;`-joined vision tags.
pub const TAGS_KEY: &str = "Tags";

#[derive(Error, Debug)]
pub enum GalleryError {
    #[error("{0}")]
    Blob(#[from] BlobError),

    #[error("{0}")]
    Vision(#[from] VisionError),

    #[error("{0}")]
    Thumbnail(#[from] ThumbnailError),

    #[error("Invalid file name: {0}")]
    InvalidFileName(String),

    #[error("Background task failed: {0}")]
    Task(String),
}
