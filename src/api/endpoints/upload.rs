//! `POST /upload`: multipart image upload.

use axum::extract::{Multipart, State};
use axum::response::{IntoResponse, Redirect, Response};

use crate::api::flash;
use crate::api::types::ApiContext;
use crate::gallery::{ImageUpload, UploadOutcome};

const FILE_FIELD: &str = "file";
const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

/// Store the uploaded file and redirect to the index. Problems become a
/// flash message rather than an error page.
pub async fn upload(State(ctx): State<ApiContext>, multipart: Multipart) -> Response {
    let outcome = match read_file_field(multipart).await {
        Ok(upload) => ctx.gallery.upload(upload).await,
        Err(message) => {
            tracing::warn!(error = %message, "Failed to read upload");
            UploadOutcome::Failed(message)
        }
    };

    let mut response = Redirect::to("/").into_response();
    if let Some(message) = outcome.user_message() {
        flash::set(&mut response, message);
    }
    response
}

/// The `file` part of the form, if one was sent. Other parts are skipped.
async fn read_file_field(mut multipart: Multipart) -> Result<Option<ImageUpload>, String> {
    while let Some(field) = multipart.next_field().await.map_err(|e| e.body_text())? {
        if field.name() != Some(FILE_FIELD) {
            continue;
        }
        let file_name = field.file_name().unwrap_or_default().to_string();
        let content_type = field
            .content_type()
            .unwrap_or(DEFAULT_CONTENT_TYPE)
            .to_string();
        let bytes = field.bytes().await.map_err(|e| e.body_text())?;
        return Ok(Some(ImageUpload {
            file_name,
            content_type,
            bytes: bytes.to_vec(),
        }));
    }
    Ok(None)
}
