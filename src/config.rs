use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};
use std::path::PathBuf;

/// Application-level constants
pub const APP_NAME: &str = "Intellipix";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default dataset for the sentiment trainer (text \t label, no header).
pub const DEFAULT_SENTIMENT_DATA: &str = "Data/yelp_labelled.tsv";
/// Default output archive for the trained sentiment model.
pub const DEFAULT_SENTIMENT_MODEL: &str = "Data/Sentiment.model";

/// Blob container holding original uploads.
pub const PHOTOS_CONTAINER: &str = "photos";
/// Blob container holding generated thumbnails.
pub const THUMBNAILS_CONTAINER: &str = "thumbnails";

/// Fixed thumbnail width in pixels. Height follows the aspect ratio.
pub const THUMBNAIL_WIDTH: u32 = 192;

const DEFAULT_BIND: &str = "127.0.0.1:5000";
const DEFAULT_MAX_UPLOAD_MB: usize = 20;

/// Default `EnvFilter` directive when `RUST_LOG` is unset.
pub fn default_log_filter() -> &'static str {
    "info,intellipix=debug,hyper=warn,reqwest=warn"
}

/// Get the application data directory
/// ~/Intellipix/ on all platforms, used by the local blob store.
pub fn app_data_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join(APP_NAME)
}

/// Get the local blob storage root
pub fn blobs_dir() -> PathBuf {
    app_data_dir().join("blobs")
}

/// Where uploaded images and their metadata live.
#[derive(Debug, Clone, PartialEq)]
pub enum StorageSettings {
    /// Azure storage account connection string.
    Azure { connection_string: String },
    /// Filesystem directory, one sub-directory per container.
    Local { root: PathBuf },
}

/// Hosted computer-vision credentials.
#[derive(Debug, Clone, PartialEq)]
pub struct VisionSettings {
    pub endpoint: String,
    pub key: String,
}

/// Runtime settings for the gallery web app, read from the environment.
#[derive(Debug, Clone)]
pub struct GallerySettings {
    pub bind: SocketAddr,
    /// Externally visible base URL, used for local blob URIs.
    pub public_url: Option<String>,
    pub storage: StorageSettings,
    pub vision: Option<VisionSettings>,
    pub max_upload_bytes: usize,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for {var}: {reason}")]
    Invalid { var: &'static str, reason: String },
}

impl GallerySettings {
    /// Read settings from `INTELLIPIX_*` environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build settings from an arbitrary key lookup (environment in production).
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let bind_raw = get("INTELLIPIX_BIND").unwrap_or_else(|| DEFAULT_BIND.to_string());
        let bind = bind_raw
            .parse::<SocketAddr>()
            .map_err(|e| ConfigError::Invalid {
                var: "INTELLIPIX_BIND",
                reason: e.to_string(),
            })?;

        let storage = match get("INTELLIPIX_STORAGE") {
            Some(connection_string) => StorageSettings::Azure { connection_string },
            None => StorageSettings::Local {
                root: get("INTELLIPIX_DATA_DIR")
                    .map(PathBuf::from)
                    .unwrap_or_else(blobs_dir),
            },
        };

        let vision = match (get("INTELLIPIX_VISION_ENDPOINT"), get("INTELLIPIX_VISION_KEY")) {
            (Some(endpoint), Some(key)) => Some(VisionSettings { endpoint, key }),
            (None, None) => None,
            (Some(_), None) => {
                return Err(ConfigError::Invalid {
                    var: "INTELLIPIX_VISION_KEY",
                    reason: "endpoint is set but key is missing".into(),
                })
            }
            (None, Some(_)) => {
                return Err(ConfigError::Invalid {
                    var: "INTELLIPIX_VISION_ENDPOINT",
                    reason: "key is set but endpoint is missing".into(),
                })
            }
        };

        let max_upload_mb = match get("INTELLIPIX_MAX_UPLOAD_MB") {
            Some(raw) => raw.parse::<usize>().map_err(|e| ConfigError::Invalid {
                var: "INTELLIPIX_MAX_UPLOAD_MB",
                reason: e.to_string(),
            })?,
            None => DEFAULT_MAX_UPLOAD_MB,
        };

        Ok(Self {
            bind,
            public_url: get("INTELLIPIX_PUBLIC_URL").map(|u| u.trim_end_matches('/').to_string()),
            storage,
            vision,
            max_upload_bytes: max_upload_mb * 1024 * 1024,
        })
    }

    /// Base URL used when the local store renders blob URIs.
    /// A wildcard bind address is replaced with loopback so browsers can load it.
    pub fn base_url(&self) -> String {
        if let Some(url) = &self.public_url {
            return url.clone();
        }
        let mut addr = self.bind;
        if addr.ip().is_unspecified() {
            addr.set_ip(match addr.ip() {
                IpAddr::V4(_) => IpAddr::V4(Ipv4Addr::LOCALHOST),
                IpAddr::V6(_) => IpAddr::V6(Ipv6Addr::LOCALHOST),
            });
        }
        format!("http://{addr}")
    }
}
