use crate::api::AppState;
use crate::error::AppError;
use axum::{extract::State, Json};
use std::sync::atomic::Ordering;

pub async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({"status": "ok"}))
}

/// Ready once the store answers; reports the indexer state and resume point.
pub async fn ready(State(state): State<AppState>) -> Result<Json<serde_json::Value>, AppError> {
    state
        .repo
        .ping()
        .await
        .map_err(|e| AppError::Unavailable(format!("database unreachable: {}", e)))?;

    let checkpoint = state
        .repo
        .get_checkpoint(&state.processor_name)
        .await
        .map_err(|e| AppError::Unavailable(format!("checkpoint unreadable: {}", e)))?;

    Ok(Json(serde_json::json!({
        "status": "ready",
        "indexer_running": state.indexer_running.load(Ordering::SeqCst),
        "last_processed_version": checkpoint.map(|c| c.last_processed_version),
    })))
}
