use serde::Serialize;

use super::blob::BlobItem;
use super::{CAPTION_KEY, TAGS_KEY};
use crate::config::{PHOTOS_CONTAINER, THUMBNAILS_CONTAINER};

/// One gallery entry as rendered by the index page.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BlobData {
    pub image_uri: String,
    pub thumbnail_uri: String,
    pub caption: String,
}

/// Trim the search term; blank terms mean "no filter".
pub fn normalize_term(term: Option<&str>) -> Option<String> {
    term.map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
}

/// Case-insensitive substring match against the caption or the tags.
/// With no term every blob matches.
pub fn matches_term(item: &BlobItem, term: Option<&str>) -> bool {
    let Some(term) = term else {
        return true;
    };
    let needle = term.to_lowercase();
    [CAPTION_KEY, TAGS_KEY]
        .iter()
        .filter_map(|key| item.metadata_value(key))
        .any(|value| value.to_lowercase().contains(&needle))
}

/// Thumbnails share the photo's name in the sibling container.
pub fn thumbnail_uri_for(image_uri: &str) -> String {
    image_uri.replace(
        &format!("/{PHOTOS_CONTAINER}/"),
        &format!("/{THUMBNAILS_CONTAINER}/"),
    )
}
