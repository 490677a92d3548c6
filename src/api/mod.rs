//! Intellipix web app.
//!
//! Server-rendered gallery pages over `GalleryService`. The router is
//! composable: `gallery_router()` returns a `Router` that can be mounted on
//! any axum server, and `start_gallery_server()` runs it in the background.

pub mod endpoints;
pub mod error;
pub mod flash;
pub mod middleware;
pub mod render;
pub mod router;
pub mod server;
pub mod types;

pub use router::gallery_router;
pub use server::{start_gallery_server, GalleryServer, ServerError, ServerSession};
pub use types::ApiContext;
