use axum::extract::State;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::Value;

use crate::error::AppResult;
use crate::state::AppState;
use crate::workspace::transfer::{ExportDocument, ImportReport};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/export", get(export))
        .route("/import", post(import))
}

async fn export(State(state): State<AppState>) -> AppResult<Json<ExportDocument>> {
    let document = state.sync.read(|workspace| workspace.export()).await??;
    Ok(Json(document))
}

async fn import(
    State(state): State<AppState>,
    Json(payload): Json<Value>,
) -> AppResult<Json<ImportReport>> {
    let report = state.sync.import(&payload).await?;
    Ok(Json(report))
}
