//! Web-layer errors rendered as HTML error pages.

use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Response};

use crate::api::render;
use crate::gallery::GalleryError;

/// Marks a response as a rendered error page so the logging middleware can
/// re-render it with the request id.
#[derive(Debug, Clone, Copy)]
pub struct ErrorPage;

/// Errors that end a request with an error page instead of a redirect.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Invalid request: {0}")]
    BadRequest(String),
    #[error("Internal error: {0}")]
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Internal(detail) => {
                tracing::error!(detail, "Request failed");
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        // Details stay in the log; the page is generic.
        let mut response = (status, Html(render::error_page(None))).into_response();
        response.extensions_mut().insert(ErrorPage);
        response
    }
}

impl From<GalleryError> for ApiError {
    fn from(err: GalleryError) -> Self {
        ApiError::Internal(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;

    use crate::gallery::BlobError;

    async fn body_text(response: Response) -> String {
        let body = to_bytes(response.into_body(), 64 * 1024).await.unwrap();
        String::from_utf8(body.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn internal_returns_500_without_details() {
        let response = ApiError::Internal("storage key rejected".into()).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let html = body_text(response).await;
        assert!(html.contains("An error occurred while processing your request."));
        assert!(!html.contains("storage key rejected"));
    }

    #[tokio::test]
    async fn not_found_returns_404() {
        let response = ApiError::NotFound("no such page".into()).into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn bad_request_returns_400() {
        let response = ApiError::BadRequest("bad form".into()).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn error_page_is_html() {
        let response = ApiError::Internal("x".into()).into_response();
        let content_type = response.headers().get("content-type").unwrap();
        assert!(content_type.to_str().unwrap().starts_with("text/html"));
    }

    #[test]
    fn error_response_is_marked_for_request_id() {
        let response = ApiError::NotFound("x".into()).into_response();
        assert!(response.extensions().get::<ErrorPage>().is_some());
    }

    #[test]
    fn gallery_error_maps_to_internal() {
        let err: ApiError = GalleryError::from(BlobError::Listing("truncated".into())).into();
        assert!(matches!(err, ApiError::Internal(ref d) if d.contains("truncated")));
    }
}
