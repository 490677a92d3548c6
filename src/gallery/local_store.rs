//! Filesystem blob store for development and tests.
//!
//! Layout under `root`:
//! - `{container}/{name}`: blob content, served by the web app under `/blobs/`
//! - `.metadata/{container}/{name}.json`: user metadata

use std::collections::BTreeMap;
use std::path::PathBuf;

use async_trait::async_trait;

use super::blob::{join_blob_url, validate_blob_name, BlobError, BlobItem, BlobStore};

const METADATA_DIR: &str = ".metadata";

/// URL prefix the web app serves local blobs under.
pub const LOCAL_BLOB_ROUTE: &str = "/blobs";

pub struct LocalBlobStore {
    root: PathBuf,
    base_url: String,
}

impl LocalBlobStore {
    /// `base_url` is the externally visible web app origin, e.g. `http://127.0.0.1:5000`.
    pub fn new(root: impl Into<PathBuf>, base_url: &str) -> Self {
        Self {
            root: root.into(),
            base_url: format!("{}{}", base_url.trim_end_matches('/'), LOCAL_BLOB_ROUTE),
        }
    }

    pub fn container_dir(&self, container: &str) -> PathBuf {
        self.root.join(container)
    }

    fn blob_path(&self, container: &str, name: &str) -> Result<PathBuf, BlobError> {
        validate_blob_name(container)?;
        validate_blob_name(name)?;
        Ok(self.container_dir(container).join(name))
    }

    fn metadata_path(&self, container: &str, name: &str) -> PathBuf {
        self.root
            .join(METADATA_DIR)
            .join(container)
            .join(format!("{name}.json"))
    }

    async fn read_metadata(
        &self,
        container: &str,
        name: &str,
    ) -> Result<BTreeMap<String, String>, BlobError> {
        match tokio::fs::read(self.metadata_path(container, name)).await {
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(BTreeMap::new()),
            Err(e) => Err(e.into()),
        }
    }
}

#[async_trait]
impl BlobStore for LocalBlobStore {
    async fn ensure_container(&self, container: &str) -> Result<(), BlobError> {
        validate_blob_name(container)?;
        tokio::fs::create_dir_all(self.container_dir(container)).await?;
        Ok(())
    }

    async fn upload(
        &self,
        container: &str,
        name: &str,
        data: &[u8],
        _content_type: &str,
    ) -> Result<(), BlobError> {
        let path = self.blob_path(container, name)?;
        tokio::fs::create_dir_all(self.container_dir(container)).await?;
        tokio::fs::write(&path, data).await?;

        // Overwriting a blob drops its previous metadata, as in blob storage.
        match tokio::fs::remove_file(self.metadata_path(container, name)).await {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }

        tracing::debug!(container, name, size = data.len(), "Local blob written");
        Ok(())
    }

    async fn set_metadata(
        &self,
        container: &str,
        name: &str,
        metadata: &BTreeMap<String, String>,
    ) -> Result<(), BlobError> {
        let path = self.blob_path(container, name)?;
        if !tokio::fs::try_exists(&path).await? {
            return Err(BlobError::Service {
                status: 404,
                body: format!("blob {container}/{name} does not exist"),
            });
        }

        let meta_path = self.metadata_path(container, name);
        if let Some(parent) = meta_path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&meta_path, serde_json::to_vec_pretty(metadata)?).await?;
        Ok(())
    }

    async fn list_with_metadata(&self, container: &str) -> Result<Vec<BlobItem>, BlobError> {
        validate_blob_name(container)?;
        let dir = self.container_dir(container);
        let mut entries = match tokio::fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut items = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            if !entry.file_type().await?.is_file() {
                continue;
            }
            let name = entry.file_name().to_string_lossy().into_owned();
            let metadata = self.read_metadata(container, &name).await?;
            items.push(BlobItem { name, metadata });
        }
        items.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(items)
    }

    fn blob_uri(&self, container: &str, name: &str) -> String {
        join_blob_url(&self.base_url, container, name)
    }
}
