use crate::{metrics::MetricsSnapshot, AppState};
use axum::{extract::State, Json};

pub async fn handle_metrics(State(state): State<AppState>) -> Json<MetricsSnapshot> {
    Json(state.metrics.snapshot())
}
