use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};

use crate::error::AppResult;
use crate::model::{Company, CompanyDraft, CompanyPatch};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/companies", get(list_companies).post(create_company))
        .route(
            "/companies/{company_id}",
            get(get_company)
                .patch(update_company)
                .delete(delete_company),
        )
}

async fn list_companies(State(state): State<AppState>) -> AppResult<Json<Vec<Company>>> {
    let companies = state
        .sync
        .read(|workspace| workspace.list_companies())
        .await?;
    Ok(Json(companies))
}

async fn create_company(
    State(state): State<AppState>,
    Json(payload): Json<CompanyDraft>,
) -> AppResult<(StatusCode, Json<Company>)> {
    let company = state.sync.create_company(payload).await?;
    Ok((StatusCode::CREATED, Json(company)))
}

async fn get_company(
    State(state): State<AppState>,
    Path(company_id): Path<String>,
) -> AppResult<Json<Company>> {
    let company = state
        .sync
        .read(|workspace| workspace.find_company(&company_id).cloned())
        .await??;
    Ok(Json(company))
}

async fn update_company(
    State(state): State<AppState>,
    Path(company_id): Path<String>,
    Json(payload): Json<CompanyPatch>,
) -> AppResult<Json<Company>> {
    let company = state.sync.update_company(&company_id, payload).await?;
    Ok(Json(company))
}

async fn delete_company(
    State(state): State<AppState>,
    Path(company_id): Path<String>,
) -> AppResult<StatusCode> {
    state.sync.delete_company(&company_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;
    use serde_json::{json, Value};

    use crate::api::testing;

    #[tokio::test]
    async fn deleting_a_company_detaches_its_projects() {
        let server = testing::server();

        let company: Value = server
            .post("/api/v1/companies")
            .json(&json!({ "name": "Nordbygg AS", "email": "post@nordbygg.no" }))
            .await
            .json();
        let company_id = company["id"].as_str().expect("company id").to_string();

        let project: Value = server
            .post("/api/v1/projects")
            .json(&json!({ "name": "Harbor Bridge", "companyId": company_id }))
            .await
            .json();
        let project_id = project["id"].as_str().expect("project id").to_string();
        assert_eq!(project["companyId"], company_id.as_str());

        let renamed: Value = server
            .patch(&format!("/api/v1/companies/{company_id}"))
            .json(&json!({ "phone": "22 00 00 00" }))
            .await
            .json();
        assert_eq!(renamed["name"], "Nordbygg AS");

        server
            .delete(&format!("/api/v1/companies/{company_id}"))
            .await
            .assert_status(StatusCode::NO_CONTENT);

        let project: Value = server
            .get(&format!("/api/v1/projects/{project_id}"))
            .await
            .json();
        assert!(project.get("companyId").is_none());

        server
            .post("/api/v1/projects")
            .json(&json!({ "name": "Ghost Works", "companyId": company_id }))
            .await
            .assert_status(StatusCode::NOT_FOUND);
    }
}
