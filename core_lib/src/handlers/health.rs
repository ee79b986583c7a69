//! Health check handler

use crate::AppState;
use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use tracing::warn;

pub async fn handle_health(State(state): State<AppState>) -> impl IntoResponse {
    let storage_path = state.file_store.storage_path().to_path_buf();

    let (status_code, status, storage) = match tokio::fs::read_dir(&storage_path).await {
        Ok(_) => (StatusCode::OK, "healthy", "readable".to_string()),
        Err(e) => {
            warn!("Storage directory {} is not readable: {}", storage_path.display(), e);
            (StatusCode::SERVICE_UNAVAILABLE, "unhealthy", "unreadable".to_string())
        }
    };

    (
        status_code,
        Json(serde_json::json!({
            "status": status,
            "version": state.version,
            "timestamp": chrono::Utc::now().to_rfc3339(),
            "storage": storage,
        })),
    )
}
