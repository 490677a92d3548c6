//! Gallery operations behind the web endpoints: index/search and upload.

use std::collections::BTreeMap;
use std::sync::Arc;

use super::blob::{blob_file_name, BlobStore};
use super::search::{matches_term, normalize_term, thumbnail_uri_for, BlobData};
use super::thumbnail::make_thumbnail;
use super::vision::VisionClient;
use super::{GalleryError, CAPTION_KEY, TAGS_KEY};
use crate::config::{PHOTOS_CONTAINER, THUMBNAILS_CONTAINER};

/// Message shown when the upload is not an image.
pub const NOT_AN_IMAGE_MESSAGE: &str = "Only image files may be uploaded";

/// A file received from the upload form.
#[derive(Debug, Clone)]
pub struct ImageUpload {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

/// What happened to an upload. Every outcome ends in a redirect to the index.
#[derive(Debug, Clone, PartialEq)]
pub enum UploadOutcome {
    /// No file, or a zero-length file: nothing to do.
    Empty,
    /// Declined before touching storage.
    Rejected(String),
    /// Stored, thumbnailed and captioned.
    Stored { name: String, caption: String },
    /// Some step failed; the message is shown to the user.
    Failed(String),
}

impl UploadOutcome {
    /// The one-shot message for the next index page, if any.
    pub fn user_message(&self) -> Option<&str> {
        match self {
            UploadOutcome::Rejected(message) | UploadOutcome::Failed(message) => {
                Some(message.as_str())
            }
            UploadOutcome::Empty | UploadOutcome::Stored { .. } => None,
        }
    }
}

pub struct GalleryService {
    store: Arc<dyn BlobStore>,
    vision: Arc<dyn VisionClient>,
}

impl GalleryService {
    pub fn new(store: Arc<dyn BlobStore>, vision: Arc<dyn VisionClient>) -> Self {
        Self { store, vision }
    }

    /// Make sure both containers exist.
    pub async fn prepare(&self) -> Result<(), GalleryError> {
        self.store.ensure_container(PHOTOS_CONTAINER).await?;
        self.store.ensure_container(THUMBNAILS_CONTAINER).await?;
        Ok(())
    }

    /// Photos whose caption or tags contain `term` (all photos for a blank term).
    pub async fn index(&self, term: Option<&str>) -> Result<Vec<BlobData>, GalleryError> {
        let term = normalize_term(term);
        let items = self.store.list_with_metadata(PHOTOS_CONTAINER).await?;
        let total = items.len();

        let blobs: Vec<BlobData> = items
            .iter()
            .filter(|item| matches_term(item, term.as_deref()))
            .map(|item| {
                let image_uri = self.store.blob_uri(PHOTOS_CONTAINER, &item.name);
                BlobData {
                    thumbnail_uri: thumbnail_uri_for(&image_uri),
                    image_uri,
                    caption: item.metadata_value(CAPTION_KEY).unwrap_or_default().to_string(),
                }
            })
            .collect();

        tracing::debug!(term = term.as_deref().unwrap_or(""), total, matched = blobs.len(), "Gallery listed");
        Ok(blobs)
    }

    /// Store, thumbnail and caption an upload. Failures are folded into
    /// the outcome rather than returned.
    pub async fn upload(&self, upload: Option<ImageUpload>) -> UploadOutcome {
        let Some(upload) = upload.filter(|u| !u.bytes.is_empty()) else {
            return UploadOutcome::Empty;
        };
        if !upload.content_type.starts_with("image") {
            tracing::info!(
                file = %upload.file_name,
                content_type = %upload.content_type,
                "Upload rejected: not an image"
            );
            return UploadOutcome::Rejected(NOT_AN_IMAGE_MESSAGE.to_string());
        }

        let file_name = upload.file_name.clone();
        match self.store_and_describe(upload).await {
            Ok((name, caption)) => {
                tracing::info!(name = %name, caption = %caption, "Upload stored and captioned");
                UploadOutcome::Stored { name, caption }
            }
            Err(e) => {
                tracing::warn!(file = %file_name, error = %e, "Upload failed");
                UploadOutcome::Failed(e.to_string())
            }
        }
    }

    async fn store_and_describe(&self, upload: ImageUpload) -> Result<(String, String), GalleryError> {
        let name = blob_file_name(&upload.file_name)?;

        self.store
            .upload(PHOTOS_CONTAINER, &name, &upload.bytes, &upload.content_type)
            .await?;

        // Decoding and resizing are CPU-bound.
        let bytes = upload.bytes;
        let (bytes, thumbnail) = tokio::task::spawn_blocking(move || {
            let thumbnail = make_thumbnail(&bytes);
            (bytes, thumbnail)
        })
        .await
        .map_err(|e| GalleryError::Task(e.to_string()))?;
        let thumbnail = thumbnail?;

        self.store
            .upload(THUMBNAILS_CONTAINER, &name, &thumbnail.bytes, thumbnail.content_type)
            .await?;

        let description = self.vision.describe(&bytes).await?;
        let caption = description.primary_caption()?.to_string();

        let mut metadata = BTreeMap::new();
        metadata.insert(CAPTION_KEY.to_string(), caption.clone());
        metadata.insert(TAGS_KEY.to_string(), description.joined_tags());
        self.store.set_metadata(PHOTOS_CONTAINER, &name, &metadata).await?;

        Ok((name, caption))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gallery::local_store::LocalBlobStore;
    use crate::gallery::vision::{DisabledVision, MockVisionClient};
    use image::{DynamicImage, ImageOutputFormat, Rgb, RgbImage};

    fn png(width: u32, height: u32) -> Vec<u8> {
        let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(width, height, Rgb([200, 30, 30])));
        let mut buf = Vec::new();
        img.write_to(&mut buf, ImageOutputFormat::Png).unwrap();
        buf
    }

    fn service(vision: Arc<dyn VisionClient>) -> (GalleryService, Arc<LocalBlobStore>, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(LocalBlobStore::new(dir.path(), "http://localhost:5000"));
        let service = GalleryService::new(store.clone(), vision);
        (service, store, dir)
    }

    fn upload(name: &str, content_type: &str, bytes: Vec<u8>) -> Option<ImageUpload> {
        Some(ImageUpload {
            file_name: name.into(),
            content_type: content_type.into(),
            bytes,
        })
    }

    #[tokio::test]
    async fn upload_stores_photo_thumbnail_and_metadata() {
        let (service, store, _dir) =
            service(Arc::new(MockVisionClient::new("a red square", &["red", "square"])));

        let outcome = service
            .upload(upload("C:\\pics\\red.png", "image/png", png(384, 192)))
            .await;
        assert_eq!(
            outcome,
            UploadOutcome::Stored {
                name: "red.png".into(),
                caption: "a red square".into()
            }
        );

        let photos = store.list_with_metadata(PHOTOS_CONTAINER).await.unwrap();
        assert_eq!(photos.len(), 1);
        assert_eq!(photos[0].metadata_value(TAGS_KEY), Some("red;square"));

        let thumb = std::fs::read(store.container_dir(THUMBNAILS_CONTAINER).join("red.png")).unwrap();
        let decoded = image::load_from_memory(&thumb).unwrap();
        assert_eq!(image::GenericImageView::dimensions(&decoded), (192, 96));
    }

    #[tokio::test]
    async fn empty_upload_is_a_noop() {
        let (service, store, _dir) = service(Arc::new(MockVisionClient::new("x", &[])));
        assert_eq!(service.upload(None).await, UploadOutcome::Empty);
        assert_eq!(
            service.upload(upload("a.png", "image/png", Vec::new())).await,
            UploadOutcome::Empty
        );
        assert!(store.list_with_metadata(PHOTOS_CONTAINER).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn non_image_is_rejected_without_storing() {
        let (service, store, _dir) = service(Arc::new(MockVisionClient::new("x", &[])));
        let outcome = service
            .upload(upload("notes.txt", "text/plain", b"hello".to_vec()))
            .await;
        assert_eq!(outcome.user_message(), Some(NOT_AN_IMAGE_MESSAGE));
        assert!(store.list_with_metadata(PHOTOS_CONTAINER).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn vision_failure_surfaces_message_and_keeps_photo() {
        let (service, store, _dir) = service(Arc::new(DisabledVision));
        let outcome = service
            .upload(upload("red.png", "image/png", png(50, 50)))
            .await;
        assert_eq!(
            outcome.user_message(),
            Some("Computer Vision is not configured")
        );

        let photos = store.list_with_metadata(PHOTOS_CONTAINER).await.unwrap();
        assert_eq!(photos.len(), 1);
        assert!(photos[0].metadata.is_empty());
    }

    #[tokio::test]
    async fn missing_caption_fails_upload() {
        let (service, _store, _dir) = service(Arc::new(MockVisionClient::without_caption()));
        let outcome = service
            .upload(upload("red.png", "image/png", png(20, 20)))
            .await;
        assert!(matches!(outcome, UploadOutcome::Failed(_)));
    }

    #[tokio::test]
    async fn corrupt_image_fails_after_storing_original() {
        let (service, store, _dir) = service(Arc::new(MockVisionClient::new("x", &[])));
        let outcome = service
            .upload(upload("broken.jpg", "image/jpeg", b"not really a jpeg".to_vec()))
            .await;
        assert_eq!(outcome.user_message(), Some("Unrecognised image format"));
        assert_eq!(store.list_with_metadata(PHOTOS_CONTAINER).await.unwrap().len(), 1);
        assert!(store
            .list_with_metadata(THUMBNAILS_CONTAINER)
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn index_filters_by_term_and_derives_thumbnail_uri() {
        let (service, _store, _dir) =
            service(Arc::new(MockVisionClient::new("a dog in the park", &["dog", "grass"])));
        service.upload(upload("dog.png", "image/png", png(40, 40))).await;

        let all = service.index(None).await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].image_uri, "http://localhost:5000/blobs/photos/dog.png");
        assert_eq!(all[0].thumbnail_uri, "http://localhost:5000/blobs/thumbnails/dog.png");
        assert_eq!(all[0].caption, "a dog in the park");

        assert_eq!(service.index(Some("  GRASS ")).await.unwrap().len(), 1);
        assert!(service.index(Some("cat")).await.unwrap().is_empty());
        assert_eq!(service.index(Some("   ")).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn prepare_creates_both_containers() {
        let (service, store, _dir) = service(Arc::new(DisabledVision));
        service.prepare().await.unwrap();
        assert!(store.container_dir(PHOTOS_CONTAINER).is_dir());
        assert!(store.container_dir(THUMBNAILS_CONTAINER).is_dir());
    }
}
