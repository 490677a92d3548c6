use std::collections::BTreeMap;

use async_trait::async_trait;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BlobError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Storage request failed: {0}")]
    HttpClient(String),

    #[error("Storage returned error (status {status}): {body}")]
    Service { status: u16, body: String },

    #[error("Invalid storage connection string: {0}")]
    ConnectionString(String),

    #[error("Invalid blob name: {0}")]
    InvalidName(String),

    #[error("Metadata value for '{0}' cannot be stored")]
    InvalidMetadata(String),

    #[error("Malformed blob listing: {0}")]
    Listing(String),

    #[error("Metadata serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

/// A listed blob with its user metadata.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BlobItem {
    pub name: String,
    pub metadata: BTreeMap<String, String>,
}

impl BlobItem {
    /// Case-insensitive metadata lookup (storage services normalise key case differently).
    pub fn metadata_value(&self, key: &str) -> Option<&str> {
        self.metadata
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| v.as_str())
    }
}

/// Blob storage keyed by container and file name.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Create the container if it does not exist yet.
    async fn ensure_container(&self, container: &str) -> Result<(), BlobError>;

    /// Store `data` under `container/name`, overwriting any existing blob.
    async fn upload(
        &self,
        container: &str,
        name: &str,
        data: &[u8],
        content_type: &str,
    ) -> Result<(), BlobError>;

    /// Replace the blob's user metadata.
    async fn set_metadata(
        &self,
        container: &str,
        name: &str,
        metadata: &BTreeMap<String, String>,
    ) -> Result<(), BlobError>;

    /// All blobs in the container, in name order, with metadata.
    async fn list_with_metadata(&self, container: &str) -> Result<Vec<BlobItem>, BlobError>;

    /// Public URI of `container/name`.
    fn blob_uri(&self, container: &str, name: &str) -> String;
}

/// Reduce an uploaded file name to its last path component, as a blob name.
///
/// Both `/` and `\` count as separators since browsers on Windows may send
/// full client paths.
pub fn blob_file_name(raw: &str) -> Result<String, BlobError> {
    let name = raw
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or_default()
        .trim()
        .to_string();
    validate_blob_name(&name)?;
    Ok(name)
}

/// Reject names that would escape a container or are not storable.
pub fn validate_blob_name(name: &str) -> Result<(), BlobError> {
    if name.is_empty() || name == "." || name == ".." {
        return Err(BlobError::InvalidName(format!("'{name}'")));
    }
    if name.contains(['/', '\\', '\0']) {
        return Err(BlobError::InvalidName(format!("'{name}' contains a separator")));
    }
    if name.len() > 1024 {
        return Err(BlobError::InvalidName("longer than 1024 characters".into()));
    }
    Ok(())
}

/// Build `base/container/name` with each segment percent-encoded.
pub fn join_blob_url(base: &str, container: &str, name: &str) -> String {
    match reqwest::Url::parse(base) {
        Ok(mut url) => {
            if let Ok(mut segments) = url.path_segments_mut() {
                segments.pop_if_empty().push(container).push(name);
            }
            url.to_string()
        }
        Err(_) => format!("{}/{}/{}", base.trim_end_matches('/'), container, name),
    }
}
