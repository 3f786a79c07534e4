//! Read-only HTTP API over the page store.
//!
//! # Routes
//!
//! | Route | Response |
//! |-------|----------|
//! | `GET /` | `it works` |
//! | `GET /classes[/{topic}[/{country}]]` | topic-first listing |
//! | `GET /countries[/{country}[/{topic}]]` | country-first listing |
//! | `GET /meta` | country metadata with stats and sources merged in |
//!
//! Listing routes accept `start` and `limit` query parameters (defaults `0`
//! and `10`). Anything but a non-negative decimal integer is answered with
//! `400 {"message": ...}`; store failures with `500 {"message": ...}`.

use crate::error::Error;
use crate::outputs::meta::load_meta;
use crate::query::{Grouping, ListRequest, Listing, Pagination, list};
use crate::store::PageStore;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::{Value, json};
use std::path::PathBuf;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, instrument};

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn PageStore>,
    /// Directory holding `meta.json`, `stats.json` and `sources.json`.
    pub meta_dir: PathBuf,
}

/// Raw pagination parameters; validated by [`Pagination::parse`].
#[derive(Debug, Default, Deserialize)]
pub struct PageParams {
    pub start: Option<String>,
    pub limit: Option<String>,
}

impl PageParams {
    fn pagination(&self) -> Result<Pagination, Error> {
        Pagination::parse(self.start.as_deref(), self.limit.as_deref())
    }
}

/// Error wrapper that renders as `{"message": ...}`.
#[derive(Debug)]
pub struct ApiError(Error);

impl From<Error> for ApiError {
    fn from(e: Error) -> Self {
        Self(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            Error::InvalidParameters(_) => StatusCode::BAD_REQUEST,
            other => {
                error!(error = %other, "Request failed");
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        (status, Json(json!({ "message": self.0.to_string() }))).into_response()
    }
}

type ApiResult<T> = Result<T, ApiError>;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/classes", get(classes))
        .route("/classes/:topic", get(classes_by_topic))
        .route("/classes/:topic/:country", get(classes_by_topic_country))
        .route("/countries", get(countries))
        .route("/countries/:country", get(countries_by_country))
        .route("/countries/:country/:topic", get(countries_by_country_topic))
        .route("/meta", get(meta))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn index() -> &'static str {
    "it works"
}

#[instrument(level = "info", skip(state))]
async fn listing(
    state: &AppState,
    topic: Option<String>,
    country: Option<String>,
    grouping: Grouping,
    params: &PageParams,
) -> ApiResult<Json<Listing>> {
    let pagination = params.pagination()?;
    let request = ListRequest {
        topic,
        country,
        grouping,
    };
    Ok(Json(list(state.store.as_ref(), &request, pagination).await?))
}

async fn classes(State(state): State<AppState>, Query(params): Query<PageParams>) -> ApiResult<Json<Listing>> {
    listing(&state, None, None, Grouping::TopicFirst, &params).await
}

async fn classes_by_topic(
    State(state): State<AppState>,
    Path(topic): Path<String>,
    Query(params): Query<PageParams>,
) -> ApiResult<Json<Listing>> {
    listing(&state, Some(topic), None, Grouping::TopicFirst, &params).await
}

async fn classes_by_topic_country(
    State(state): State<AppState>,
    Path((topic, country)): Path<(String, String)>,
    Query(params): Query<PageParams>,
) -> ApiResult<Json<Listing>> {
    listing(&state, Some(topic), Some(country), Grouping::TopicFirst, &params).await
}

async fn countries(State(state): State<AppState>, Query(params): Query<PageParams>) -> ApiResult<Json<Listing>> {
    listing(&state, None, None, Grouping::CountryFirst, &params).await
}

async fn countries_by_country(
    State(state): State<AppState>,
    Path(country): Path<String>,
    Query(params): Query<PageParams>,
) -> ApiResult<Json<Listing>> {
    listing(&state, None, Some(country), Grouping::CountryFirst, &params).await
}

async fn countries_by_country_topic(
    State(state): State<AppState>,
    Path((country, topic)): Path<(String, String)>,
    Query(params): Query<PageParams>,
) -> ApiResult<Json<Listing>> {
    listing(&state, Some(topic), Some(country), Grouping::CountryFirst, &params).await
}

async fn meta(State(state): State<AppState>) -> ApiResult<Json<Value>> {
    Ok(Json(load_meta(&state.meta_dir).await?))
}
