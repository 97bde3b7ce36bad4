pub mod companies;
pub mod gantt;
pub mod geocode;
pub mod notices;
pub mod projects;
pub mod todos;
pub mod transfer;
pub mod users;

use axum::extract::{DefaultBodyLimit, State};
use axum::http::HeaderMap;
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;
use tower_http::compression::CompressionLayer;
use tower_http::trace::TraceLayer;

use crate::state::AppState;

pub const ACTOR_HEADER: &str = "x-user-id";

pub fn router() -> Router<AppState> {
    Router::new()
        .merge(projects::router())
        .merge(todos::router())
        .merge(gantt::router())
        .merge(users::router())
        .merge(companies::router())
        .merge(geocode::router())
        .merge(transfer::router())
        .merge(notices::router())
}

pub fn app(state: AppState) -> Router {
    let max_request_body_bytes = state.config.max_request_body_bytes;

    Router::new()
        .nest("/api/v1", router())
        .route("/healthz", get(healthz))
        .layer(DefaultBodyLimit::max(max_request_body_bytes))
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[derive(Debug, Serialize)]
pub struct HealthzResponse {
    pub status: &'static str,
    pub loaded: bool,
}

pub async fn healthz(State(state): State<AppState>) -> Json<HealthzResponse> {
    Json(HealthzResponse {
        status: "ok",
        loaded: state.sync.is_loaded(),
    })
}

/// Id of the acting user for audit fields, when the client sent one.
pub fn actor_from_headers(headers: &HeaderMap) -> Option<String> {
    headers
        .get(ACTOR_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(ToOwned::to_owned)
}

#[cfg(test)]
pub(crate) mod testing {
    use std::sync::Arc;

    use async_trait::async_trait;
    use axum_test::TestServer;

    use crate::config::Config;
    use crate::error::AppResult;
    use crate::geocode::{AddressSuggestion, Geocoder, ReverseAddress};
    use crate::state::AppState;
    use crate::store::InMemoryDocumentStore;

    pub struct EchoGeocoder;

    #[async_trait]
    impl Geocoder for EchoGeocoder {
        async fn search(&self, query: &str) -> AppResult<Vec<AddressSuggestion>> {
            Ok(vec![AddressSuggestion {
                display_address: format!("{query}, Oslo"),
                lat: 59.91,
                lng: 10.75,
                plot_number: Some("7".to_string()),
            }])
        }

        async fn reverse(&self, lat: f64, lng: f64) -> AppResult<Option<ReverseAddress>> {
            Ok(Some(ReverseAddress {
                display_address: format!("{lat:.2}, {lng:.2}"),
                plot_number: None,
            }))
        }
    }

    pub fn server() -> TestServer {
        let state = AppState::new(
            Config::ephemeral(),
            Arc::new(InMemoryDocumentStore::new()),
            Arc::new(EchoGeocoder),
        );
        TestServer::new(super::app(state)).expect("test server should start")
    }
}

#[cfg(test)]
mod tests {
    use axum::http::HeaderValue;
    use serde_json::Value;

    use super::*;

    #[tokio::test]
    async fn healthz_reports_load_state() {
        let server = testing::server();

        let response = server.get("/healthz").await;
        response.assert_status_ok();
        let body: Value = response.json();
        assert_eq!(body["status"], "ok");
        assert_eq!(body["loaded"], false);

        server.get("/api/v1/projects").await.assert_status_ok();
        let body: Value = server.get("/healthz").await.json();
        assert_eq!(body["loaded"], true);
    }

    #[test]
    fn actor_header_is_trimmed_and_optional() {
        let mut headers = HeaderMap::new();
        assert_eq!(actor_from_headers(&headers), None);

        headers.insert(ACTOR_HEADER, HeaderValue::from_static("  u-17 "));
        assert_eq!(actor_from_headers(&headers).as_deref(), Some("u-17"));

        headers.insert(ACTOR_HEADER, HeaderValue::from_static("   "));
        assert_eq!(actor_from_headers(&headers), None);
    }
}
