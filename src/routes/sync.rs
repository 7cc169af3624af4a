use std::sync::Arc;

use axum::{
    extract::State,
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;

use crate::error::AppResult;
use crate::services::sync::SyncReport;
use crate::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", post(sync_now))
        .route("/status", get(get_status))
}

#[derive(Debug, Serialize)]
pub struct SyncStatusResponse {
    pub running: bool,
    pub last_report: Option<SyncReport>,
}

/// Run a reconciliation now. Answers 409 when a run is already in progress.
async fn sync_now(State(state): State<Arc<AppState>>) -> AppResult<Json<SyncReport>> {
    let report = state.sync.try_run().await?;
    Ok(Json(report))
}

async fn get_status(State(state): State<Arc<AppState>>) -> Json<SyncStatusResponse> {
    Json(SyncStatusResponse {
        running: state.sync.is_running(),
        last_report: state.sync.last_report().await,
    })
}
