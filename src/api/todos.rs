use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;

use crate::api::actor_from_headers;
use crate::error::AppResult;
use crate::model::{Task, TaskDraft, TaskStatus};
use crate::state::AppState;
use crate::workspace::projects::TaskLinks;

pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/projects/{project_id}/todos",
            get(list_to_dos).post(create_to_do),
        )
        .route(
            "/projects/{project_id}/todos/{task_id}",
            get(get_to_do).put(replace_to_do).delete(delete_to_do),
        )
        .route(
            "/projects/{project_id}/todos/{task_id}/status",
            post(set_status),
        )
        .route(
            "/projects/{project_id}/todos/{task_id}/comments",
            post(add_comment),
        )
        .route(
            "/projects/{project_id}/todos/{task_id}/links",
            get(task_links),
        )
}

#[derive(Debug, Deserialize)]
pub struct StatusRequest {
    pub status: TaskStatus,
}

#[derive(Debug, Deserialize)]
pub struct CommentRequest {
    pub text: String,
}

async fn list_to_dos(
    State(state): State<AppState>,
    Path(project_id): Path<String>,
) -> AppResult<Json<Vec<Task>>> {
    let tasks = state
        .sync
        .read(|workspace| {
            workspace
                .find_project(&project_id)
                .map(|project| project.to_dos.clone())
        })
        .await??;
    Ok(Json(tasks))
}

async fn create_to_do(
    State(state): State<AppState>,
    Path(project_id): Path<String>,
    headers: HeaderMap,
    Json(payload): Json<TaskDraft>,
) -> AppResult<(StatusCode, Json<Task>)> {
    let actor = actor_from_headers(&headers);
    let task = state
        .sync
        .add_to_do(&project_id, payload, actor.as_deref())
        .await?;
    Ok((StatusCode::CREATED, Json(task)))
}

async fn get_to_do(
    State(state): State<AppState>,
    Path((project_id, task_id)): Path<(String, String)>,
) -> AppResult<Json<Task>> {
    let task = state
        .sync
        .read(|workspace| workspace.find_to_do(&project_id, &task_id).cloned())
        .await??;
    Ok(Json(task))
}

async fn task_links(
    State(state): State<AppState>,
    Path((project_id, task_id)): Path<(String, String)>,
) -> AppResult<Json<TaskLinks>> {
    let links = state
        .sync
        .read(|workspace| workspace.task_links(&project_id, &task_id))
        .await??;
    Ok(Json(links))
}

/// Full replacement; omitted fields fall back to their defaults.
async fn replace_to_do(
    State(state): State<AppState>,
    Path((project_id, task_id)): Path<(String, String)>,
    headers: HeaderMap,
    Json(mut payload): Json<TaskDraft>,
) -> AppResult<Json<Task>> {
    payload.id = Some(task_id);
    let task = Task::from_draft(payload, &project_id);
    let actor = actor_from_headers(&headers);
    let task = state
        .sync
        .update_to_do(&project_id, task, actor.as_deref())
        .await?;
    Ok(Json(task))
}

async fn delete_to_do(
    State(state): State<AppState>,
    Path((project_id, task_id)): Path<(String, String)>,
    headers: HeaderMap,
) -> AppResult<StatusCode> {
    let actor = actor_from_headers(&headers);
    state
        .sync
        .delete_to_do(&project_id, &task_id, actor.as_deref())
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn set_status(
    State(state): State<AppState>,
    Path((project_id, task_id)): Path<(String, String)>,
    headers: HeaderMap,
    Json(payload): Json<StatusRequest>,
) -> AppResult<Json<Task>> {
    let actor = actor_from_headers(&headers);
    let task = state
        .sync
        .set_task_status(&project_id, &task_id, payload.status, actor.as_deref())
        .await?;
    Ok(Json(task))
}

async fn add_comment(
    State(state): State<AppState>,
    Path((project_id, task_id)): Path<(String, String)>,
    headers: HeaderMap,
    Json(payload): Json<CommentRequest>,
) -> AppResult<Json<Task>> {
    let actor = actor_from_headers(&headers);
    let task = state
        .sync
        .add_comment(&project_id, &task_id, &payload.text, actor.as_deref())
        .await?;
    Ok(Json(task))
}
