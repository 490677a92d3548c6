//! Gallery web router.
//!
//! Middleware stack (outermost → innermost):
//! 1. `X-Content-Type-Options: nosniff` → 2. Request log → 3. Body limit → Handler
//!
//! When the gallery runs on the local blob store, the `photos` and
//! `thumbnails` directories are served statically under `/blobs/`.

use axum::extract::DefaultBodyLimit;
use axum::http::header::X_CONTENT_TYPE_OPTIONS;
use axum::http::HeaderValue;
use axum::routing::{get, post};
use axum::Router;
use tower_http::services::ServeDir;
use tower_http::set_header::SetResponseHeaderLayer;

use crate::api::endpoints;
use crate::api::middleware;
use crate::api::types::ApiContext;
use crate::config::{PHOTOS_CONTAINER, THUMBNAILS_CONTAINER};
use crate::gallery::local_store::LOCAL_BLOB_ROUTE;

/// Build the gallery router with its middleware stack.
pub fn gallery_router(ctx: ApiContext) -> Router {
    let blob_root = ctx.blob_root.clone();

    let mut app = Router::new()
        .route("/", get(endpoints::home::index))
        .route("/privacy", get(endpoints::home::privacy))
        .route("/health", get(endpoints::health::check))
        .route("/upload", post(endpoints::upload::upload))
        .route("/search", post(endpoints::search::search))
        .layer(DefaultBodyLimit::max(ctx.max_upload_bytes))
        .with_state(ctx);

    if let Some(root) = blob_root {
        for container in [PHOTOS_CONTAINER, THUMBNAILS_CONTAINER] {
            app = app.nest_service(
                &format!("{LOCAL_BLOB_ROUTE}/{container}"),
                ServeDir::new(root.join(container)),
            );
        }
    }

    app.layer(axum::middleware::from_fn(middleware::log_request))
        .layer(SetResponseHeaderLayer::if_not_present(
            X_CONTENT_TYPE_OPTIONS,
            HeaderValue::from_static("nosniff"),
        ))
}
