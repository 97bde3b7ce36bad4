use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use serde::Serialize;

use crate::error::AppResult;
use crate::state::AppState;
use crate::sync::{Notice, ResyncReport};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/notices", get(list_notices))
        .route("/notices/{notice_id}", delete(dismiss_notice))
        .route("/notices/{notice_id}/retry", post(retry_notice))
        .route("/reload", post(reload))
}

#[derive(Debug, Serialize)]
pub struct ReloadResponse {
    pub loaded: bool,
    #[serde(flatten)]
    pub resync: ResyncReport,
}

async fn list_notices(State(state): State<AppState>) -> Json<Vec<Notice>> {
    Json(state.sync.notices())
}

async fn dismiss_notice(
    State(state): State<AppState>,
    Path(notice_id): Path<String>,
) -> AppResult<StatusCode> {
    state.sync.dismiss_notice(&notice_id)?;
    Ok(StatusCode::NO_CONTENT)
}

async fn retry_notice(
    State(state): State<AppState>,
    Path(notice_id): Path<String>,
) -> AppResult<Json<ResyncReport>> {
    Ok(Json(state.sync.retry_notice(&notice_id).await?))
}

/// Retries a failed bulk load, then pushes every pending write.
async fn reload(State(state): State<AppState>) -> AppResult<Json<ReloadResponse>> {
    let resync = state.sync.resync().await?;
    Ok(Json(ReloadResponse {
        loaded: state.sync.is_loaded(),
        resync,
    }))
}
