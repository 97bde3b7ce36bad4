use axum::extract::{Query, State};
use axum::http::HeaderMap;
use axum::routing::get;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};

use crate::api::actor_from_headers;
use crate::error::{AppError, AppResult};
use crate::geocode::{AddressSuggestion, ReverseAddress};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/geocode/search", get(search))
        .route("/geocode/reverse", get(reverse))
}

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    pub q: String,
    /// Debounce key; falls back to the acting user.
    pub session: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct SearchResponse {
    pub superseded: bool,
    pub suggestions: Vec<AddressSuggestion>,
}

#[derive(Debug, Deserialize)]
pub struct ReverseQuery {
    pub lat: f64,
    pub lng: f64,
}

#[derive(Debug, Serialize)]
pub struct ReverseResponse {
    pub address: Option<ReverseAddress>,
}

async fn search(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<SearchQuery>,
) -> Json<SearchResponse> {
    let session = query
        .session
        .filter(|value| !value.trim().is_empty())
        .or_else(|| actor_from_headers(&headers))
        .unwrap_or_else(|| "anonymous".to_string());

    let response = match state.addresses.suggest(&session, &query.q).await {
        Some(suggestions) => SearchResponse {
            superseded: false,
            suggestions,
        },
        None => SearchResponse {
            superseded: true,
            suggestions: Vec::new(),
        },
    };
    Json(response)
}

async fn reverse(
    State(state): State<AppState>,
    Query(query): Query<ReverseQuery>,
) -> AppResult<Json<ReverseResponse>> {
    if !(-90.0..=90.0).contains(&query.lat) || !(-180.0..=180.0).contains(&query.lng) {
        return Err(AppError::Validation(
            "lat must be within ±90 and lng within ±180".to_string(),
        ));
    }

    let address = state.addresses.reverse(query.lat, query.lng).await;
    Ok(Json(ReverseResponse { address }))
}
