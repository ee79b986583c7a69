//! Route table for the file store

use crate::AppState;
use axum::{
    extract::DefaultBodyLimit,
    routing::{delete, get, post},
    Router,
};

use super::{files, health, metrics};

/// Headroom over the file size limit for multipart boundaries and part headers.
const MULTIPART_OVERHEAD: usize = 64 * 1024;

/// Builds the routes with file operations mounted under `prefix` (e.g. `/files`).
pub fn create_routes(prefix: &str, max_file_size: u64) -> Router<AppState> {
    let prefix = prefix.trim_end_matches('/');
    let body_limit = usize::try_from(max_file_size)
        .unwrap_or(usize::MAX)
        .saturating_add(MULTIPART_OVERHEAD);

    let file_routes = Router::new()
        .route(
            "/upload",
            post(files::upload_file).layer(DefaultBodyLimit::max(body_limit)),
        )
        .route("/list", get(files::list_files))
        .route("/download/:file_name", get(files::download_file))
        .route("/delete/:file_name", delete(files::delete_file))
        .route("/allow-mime", post(files::allow_mime_type))
        .route("/remove-mime", post(files::remove_mime_type))
        .route("/allowed-mime", get(files::list_mime_types))
        .route("/stats", get(files::storage_stats));

    let router = Router::new()
        .route("/health", get(health::handle_health))
        .route("/metrics", get(metrics::handle_metrics));

    if prefix.is_empty() {
        router.merge(file_routes)
    } else {
        router.nest(prefix, file_routes)
    }
}
