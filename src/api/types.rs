//! Shared state handed to every handler.

use std::path::PathBuf;
use std::sync::Arc;

use crate::gallery::GalleryService;

/// Handler state. Cheap to clone.
#[derive(Clone)]
pub struct ApiContext {
    pub gallery: Arc<GalleryService>,
    /// Root directory of the local blob store, served under `/blobs` when set.
    pub blob_root: Option<PathBuf>,
    pub max_upload_bytes: usize,
}

impl ApiContext {
    pub fn new(gallery: Arc<GalleryService>, max_upload_bytes: usize) -> Self {
        Self {
            gallery,
            blob_root: None,
            max_upload_bytes,
        }
    }

    pub fn with_blob_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.blob_root = Some(root.into());
        self
    }
}
