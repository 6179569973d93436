pub mod health;

use crate::db::Repository;
use axum::{routing::get, Router};
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub repo: Arc<Repository>,
    pub processor_name: String,
    pub indexer_running: Arc<AtomicBool>,
}

impl AppState {
    pub fn new(
        repo: Arc<Repository>,
        processor_name: impl Into<String>,
        indexer_running: Arc<AtomicBool>,
    ) -> Self {
        Self {
            repo,
            processor_name: processor_name.into(),
            indexer_running,
        }
    }
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health))
        .route("/ready", get(health::ready))
        .with_state(state)
}
