//! Request logging with a per-request id.

use std::time::Instant;

use axum::http::{HeaderValue, Request};
use axum::middleware::Next;
use axum::response::{Html, IntoResponse, Response};
use uuid::Uuid;

use crate::api::error::ErrorPage;
use crate::api::render;

pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Tag the request with an id, log the outcome, and echo the id back.
pub async fn log_request(req: Request<axum::body::Body>, next: Next) -> Response {
    let method = req.method().clone();
    let path = req.uri().path().to_string();
    let request_id = Uuid::new_v4().to_string();

    let start = Instant::now();
    let mut response = next.run(req).await;
    let status = response.status().as_u16();
    let elapsed_ms = start.elapsed().as_millis() as u64;

    if response.status().is_server_error() {
        tracing::warn!(%method, %path, status, elapsed_ms, %request_id, "Request failed");
    } else {
        tracing::info!(%method, %path, status, elapsed_ms, %request_id, "Request served");
    }

    if response.extensions().get::<ErrorPage>().is_some() {
        let status = response.status();
        response = (status, Html(render::error_page(Some(&request_id)))).into_response();
    }

    if let Ok(value) = HeaderValue::from_str(&request_id) {
        response.headers_mut().insert(REQUEST_ID_HEADER, value);
    }
    response
}
