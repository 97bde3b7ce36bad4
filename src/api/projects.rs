use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::routing::{get, put};
use axum::{Json, Router};
use serde::Deserialize;

use crate::api::actor_from_headers;
use crate::error::{AppError, AppResult};
use crate::model::common::today;
use crate::model::{Project, ProjectDraft, ProjectPatch, UserRole};
use crate::state::AppState;
use crate::workspace::projects::{ProjectMember, ProjectSummary};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/projects", get(list_projects).post(create_project))
        .route(
            "/projects/{project_id}",
            get(get_project)
                .patch(update_project)
                .delete(delete_project),
        )
        .route("/projects/{project_id}/members", get(list_members))
        .route(
            "/projects/{project_id}/members/{user_id}",
            put(assign_member).delete(unassign_member),
        )
}

#[derive(Debug, Deserialize)]
pub struct AssignMemberRequest {
    #[serde(default)]
    pub role: UserRole,
}

async fn list_projects(State(state): State<AppState>) -> AppResult<Json<Vec<ProjectSummary>>> {
    let projects = state.sync.read(|workspace| workspace.list_projects()).await?;
    Ok(Json(projects))
}

async fn create_project(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<ProjectDraft>,
) -> AppResult<(StatusCode, Json<Project>)> {
    let actor = actor_from_headers(&headers);
    let project = state
        .sync
        .create_project(payload, actor.as_deref(), today())
        .await?;
    Ok((StatusCode::CREATED, Json(project)))
}

async fn get_project(
    State(state): State<AppState>,
    Path(project_id): Path<String>,
) -> AppResult<Json<Project>> {
    let project = state
        .sync
        .read(|workspace| workspace.find_project(&project_id).cloned())
        .await??;
    Ok(Json(project))
}

async fn update_project(
    State(state): State<AppState>,
    Path(project_id): Path<String>,
    headers: HeaderMap,
    Json(payload): Json<ProjectPatch>,
) -> AppResult<Json<Project>> {
    if payload.is_empty() {
        return Err(AppError::Validation(
            "at least one field must be provided".to_string(),
        ));
    }

    let actor = actor_from_headers(&headers);
    let project = state
        .sync
        .update_project(&project_id, payload, actor.as_deref())
        .await?;
    Ok(Json(project))
}

async fn delete_project(
    State(state): State<AppState>,
    Path(project_id): Path<String>,
) -> AppResult<StatusCode> {
    state.sync.delete_project(&project_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn list_members(
    State(state): State<AppState>,
    Path(project_id): Path<String>,
) -> AppResult<Json<Vec<ProjectMember>>> {
    let members = state
        .sync
        .read(|workspace| workspace.project_members(&project_id))
        .await??;
    Ok(Json(members))
}

async fn assign_member(
    State(state): State<AppState>,
    Path((project_id, user_id)): Path<(String, String)>,
    headers: HeaderMap,
    Json(payload): Json<AssignMemberRequest>,
) -> AppResult<Json<Project>> {
    let actor = actor_from_headers(&headers);
    let project = state
        .sync
        .assign_user(&project_id, &user_id, payload.role, actor.as_deref())
        .await?;
    Ok(Json(project))
}

async fn unassign_member(
    State(state): State<AppState>,
    Path((project_id, user_id)): Path<(String, String)>,
    headers: HeaderMap,
) -> AppResult<Json<Project>> {
    let actor = actor_from_headers(&headers);
    let project = state
        .sync
        .unassign_user(&project_id, &user_id, actor.as_deref())
        .await?;
    Ok(Json(project))
}

#[cfg(test)]
mod tests {
    use axum::http::{HeaderName, HeaderValue, StatusCode};
    use serde_json::{json, Value};

    use crate::api::testing;

    #[tokio::test]
    async fn project_crud_with_name_rules() {
        let server = testing::server();

        let created = server
            .post("/api/v1/projects")
            .add_header(
                HeaderName::from_static("x-user-id"),
                HeaderValue::from_static("u-1"),
            )
            .json(&json!({ "name": "Harbor Bridge", "progress": 140 }))
            .await;
        created.assert_status(StatusCode::CREATED);
        let project: Value = created.json();
        let id = project["id"].as_str().expect("id should be a string").to_string();
        assert_eq!(project["icon"], "HB");
        assert_eq!(project["progress"], 100);
        assert_eq!(project["createdBy"], "u-1");

        server
            .post("/api/v1/projects")
            .json(&json!({ "name": "Harbor Bridge" }))
            .await
            .assert_status(StatusCode::CONFLICT);

        let short = server
            .post("/api/v1/projects")
            .json(&json!({ "name": "Foo" }))
            .await;
        short.assert_status(StatusCode::BAD_REQUEST);
        let body: Value = short.json();
        assert_eq!(body["error"], "validation");

        server
            .post("/api/v1/projects")
            .json(&json!({ "name": "Foo12" }))
            .await
            .assert_status(StatusCode::CREATED);

        let listed: Value = server.get("/api/v1/projects").await.json();
        assert_eq!(listed.as_array().map(Vec::len), Some(2));

        let patched: Value = server
            .patch(&format!("/api/v1/projects/{id}"))
            .json(&json!({ "phase": "Execution" }))
            .await
            .json();
        assert_eq!(patched["phase"], "Execution");
        assert_eq!(patched["name"], "Harbor Bridge");

        server
            .patch(&format!("/api/v1/projects/{id}"))
            .json(&json!({}))
            .await
            .assert_status(StatusCode::BAD_REQUEST);

        server
            .delete(&format!("/api/v1/projects/{id}"))
            .await
            .assert_status(StatusCode::NO_CONTENT);
        server
            .get(&format!("/api/v1/projects/{id}"))
            .await
            .assert_status(StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn members_are_assigned_and_removed() {
        let server = testing::server();
        let user: Value = server
            .post("/api/v1/users")
            .json(&json!({ "name": "Ada", "surname": "Berg" }))
            .await
            .json();
        let user_id = user["id"].as_str().expect("user id").to_string();
        let project: Value = server
            .post("/api/v1/projects")
            .json(&json!({ "name": "Harbor Bridge" }))
            .await
            .json();
        let project_id = project["id"].as_str().expect("project id").to_string();

        server
            .put(&format!("/api/v1/projects/{project_id}/members/{user_id}"))
            .json(&json!({ "role": "Engineer" }))
            .await
            .assert_status_ok();
        server
            .put(&format!("/api/v1/projects/{project_id}/members/ghost"))
            .json(&json!({}))
            .await
            .assert_status(StatusCode::NOT_FOUND);

        let members: Value = server
            .get(&format!("/api/v1/projects/{project_id}/members"))
            .await
            .json();
        assert_eq!(members[0]["assignment"]["role"], "Engineer");
        assert_eq!(members[0]["user"]["name"], "Ada");

        server
            .delete(&format!("/api/v1/projects/{project_id}/members/{user_id}"))
            .await
            .assert_status_ok();
        server
            .delete(&format!("/api/v1/projects/{project_id}/members/{user_id}"))
            .await
            .assert_status(StatusCode::NOT_FOUND);
    }
}
