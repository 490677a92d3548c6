//! Gallery index and the privacy page.

use axum::extract::{Query, State};
use axum::http::HeaderMap;
use axum::response::{Html, IntoResponse, Response};
use serde::Deserialize;

use crate::api::error::ApiError;
use crate::api::types::ApiContext;
use crate::api::{flash, render};

#[derive(Debug, Default, Deserialize)]
pub struct IndexQuery {
    pub term: Option<String>,
}

/// `GET /`: thumbnails matching `?term=`, plus any pending upload message.
pub async fn index(
    State(ctx): State<ApiContext>,
    headers: HeaderMap,
    Query(query): Query<IndexQuery>,
) -> Result<Response, ApiError> {
    let message = flash::read(&headers);
    let blobs = ctx.gallery.index(query.term.as_deref()).await?;

    let html = render::index_page(query.term.as_deref(), &blobs, message.as_deref());
    let mut response = Html(html).into_response();
    if message.is_some() {
        flash::clear(&mut response);
    }
    Ok(response)
}

/// `GET /privacy`
pub async fn privacy() -> Html<String> {
    Html(render::privacy_page())
}
