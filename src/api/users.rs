use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};

use crate::error::AppResult;
use crate::model::{User, UserDraft, UserPatch};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/users", get(list_users).post(create_user))
        .route(
            "/users/{user_id}",
            get(get_user).patch(update_user).delete(delete_user),
        )
}

async fn list_users(State(state): State<AppState>) -> AppResult<Json<Vec<User>>> {
    let users = state.sync.read(|workspace| workspace.list_users()).await?;
    Ok(Json(users))
}

async fn create_user(
    State(state): State<AppState>,
    Json(payload): Json<UserDraft>,
) -> AppResult<(StatusCode, Json<User>)> {
    let user = state.sync.create_user(payload).await?;
    Ok((StatusCode::CREATED, Json(user)))
}

async fn get_user(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> AppResult<Json<User>> {
    let user = state
        .sync
        .read(|workspace| workspace.find_user(&user_id).cloned())
        .await??;
    Ok(Json(user))
}

async fn update_user(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    Json(payload): Json<UserPatch>,
) -> AppResult<Json<User>> {
    let user = state.sync.update_user(&user_id, payload).await?;
    Ok(Json(user))
}

async fn delete_user(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> AppResult<StatusCode> {
    state.sync.delete_user(&user_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;
    use serde_json::{json, Value};

    use crate::api::testing;

    #[tokio::test]
    async fn users_round_trip_and_cascade() {
        let server = testing::server();

        let created = server
            .post("/api/v1/users")
            .json(&json!({ "name": "ada", "surname": "berg", "email": "ada@example.com" }))
            .await;
        created.assert_status(StatusCode::CREATED);
        let user: Value = created.json();
        let user_id = user["id"].as_str().expect("user id").to_string();
        assert_eq!(user["icon"], "AB");
        assert_eq!(user["access"], "Guest");

        server
            .post("/api/v1/users")
            .json(&json!({ "name": "Bo", "email": "not-an-email" }))
            .await
            .assert_status(StatusCode::BAD_REQUEST);

        let patched: Value = server
            .patch(&format!("/api/v1/users/{user_id}"))
            .json(&json!({ "phone": "555-0100" }))
            .await
            .json();
        assert_eq!(patched["phone"], "555-0100");
        assert_eq!(patched["email"], "ada@example.com");

        let project: Value = server
            .post("/api/v1/projects")
            .json(&json!({ "name": "Harbor Bridge" }))
            .await
            .json();
        let project_id = project["id"].as_str().expect("project id").to_string();
        server
            .post(&format!("/api/v1/projects/{project_id}/todos"))
            .json(&json!({ "title": "Survey", "assignedTo": user_id }))
            .await
            .assert_status(StatusCode::CREATED);

        server
            .delete(&format!("/api/v1/users/{user_id}"))
            .await
            .assert_status(StatusCode::NO_CONTENT);
        let tasks: Value = server
            .get(&format!("/api/v1/projects/{project_id}/todos"))
            .await
            .json();
        assert!(tasks[0].get("assignedTo").is_none());

        server
            .get(&format!("/api/v1/users/{user_id}"))
            .await
            .assert_status(StatusCode::NOT_FOUND);
    }
}
