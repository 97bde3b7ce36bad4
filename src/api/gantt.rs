use axum::extract::{Path, Query, State};
use axum::routing::get;
use axum::{Json, Router};
use chrono::NaiveDate;
use serde::Deserialize;

use crate::error::{AppError, AppResult};
use crate::model::common::today;
use crate::schedule::{build_layout, GanttLayout, LayoutRequest};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/projects/{project_id}/gantt", get(project_gantt))
}

#[derive(Debug, Default, Deserialize)]
pub struct GanttQuery {
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
    pub today: Option<NaiveDate>,
    pub viewport_width: Option<f64>,
}

async fn project_gantt(
    State(state): State<AppState>,
    Path(project_id): Path<String>,
    Query(query): Query<GanttQuery>,
) -> AppResult<Json<GanttLayout>> {
    if query
        .viewport_width
        .is_some_and(|width| !width.is_finite() || width < 0.0)
    {
        return Err(AppError::Validation(
            "viewport_width must be a non-negative number".to_string(),
        ));
    }

    let request = LayoutRequest {
        window_start: query.start,
        window_end: query.end,
        today: query.today.unwrap_or_else(today),
        viewport_width: query.viewport_width,
    };
    let metrics = state.gantt;

    let layout = state
        .sync
        .read(|workspace| {
            workspace
                .find_project(&project_id)
                .map(|project| build_layout(&project.to_dos, request, metrics))
        })
        .await??;
    Ok(Json(layout))
}
