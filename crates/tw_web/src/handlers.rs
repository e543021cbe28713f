use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Query, State,
    },
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use tracing::{error, info};
use tw_core::{Article, Error};
use tw_crawler::{CrawlReport, JobInfo, RunOrigin, ScheduleInterval, CRAWL_JOB};
use crate::analytics::{self, GroupBy, PeriodCount, WordCount, DEFAULT_TOP_WORDS};
use crate::AppState;

const DEFAULT_ARTICLE_LIMIT: usize = 50;

/// `tw_core::Error` rendered as a JSON body with a matching status.
/// Malformed queries and bodies share the same `{"error": ...}` shape.
pub struct ApiError(Error);

impl From<Error> for ApiError {
    fn from(e: Error) -> Self {
        ApiError(e)
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError(Error::Config(rejection.body_text()))
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError(Error::Config(rejection.body_text()))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match self.0 {
            Error::Config(_) | Error::InvalidUrl(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status.is_server_error() {
            error!(error = %self.0, "Request failed");
        }
        (status, Json(json!({ "error": self.0.to_string() }))).into_response()
    }
}

type ApiResult<T> = std::result::Result<Json<T>, ApiError>;

#[derive(Debug, Deserialize)]
pub struct LimitQuery {
    pub limit: Option<usize>,
}

#[derive(Debug, Deserialize)]
pub struct VolumeQuery {
    #[serde(default)]
    pub group_by: GroupBy,
}

#[derive(Debug, Deserialize)]
pub struct ScheduleRequest {
    pub hours: u64,
}

pub async fn article_count(State(state): State<Arc<AppState>>) -> ApiResult<serde_json::Value> {
    let total = state.store.count().await?;
    Ok(Json(json!({ "total": total })))
}

/// Newest articles first.
pub async fn list_articles(
    State(state): State<Arc<AppState>>,
    query: Result<Query<LimitQuery>, QueryRejection>,
) -> ApiResult<Vec<Article>> {
    let Query(query) = query?;
    let mut articles = state.store.list_articles().await?;
    articles.reverse();
    articles.truncate(query.limit.unwrap_or(DEFAULT_ARTICLE_LIMIT));
    Ok(Json(articles))
}

pub async fn top_words(
    State(state): State<Arc<AppState>>,
    query: Result<Query<LimitQuery>, QueryRejection>,
) -> ApiResult<Vec<WordCount>> {
    let Query(query) = query?;
    let articles = state.store.list_articles().await?;
    let contents = articles
        .iter()
        .map(|a| a.content.as_str())
        .filter(|c| !c.is_empty());
    Ok(Json(analytics::top_words(contents, query.limit.unwrap_or(DEFAULT_TOP_WORDS))))
}

pub async fn crawl_volume(
    State(state): State<Arc<AppState>>,
    query: Result<Query<VolumeQuery>, QueryRejection>,
) -> ApiResult<Vec<PeriodCount>> {
    let Query(query) = query?;
    let articles = state.store.list_articles().await?;
    Ok(Json(analytics::crawl_volume(&articles, query.group_by)))
}

/// Runs a whole session before answering.
pub async fn run_crawl(State(state): State<Arc<AppState>>) -> ApiResult<CrawlReport> {
    info!("🚀 Manual crawl requested");
    let report = state.controller.run(RunOrigin::Manual).await?;
    Ok(Json(report))
}

pub async fn get_schedule(State(state): State<Arc<AppState>>) -> Json<Option<JobInfo>> {
    Json(state.registry.get(CRAWL_JOB).await)
}

pub async fn set_schedule(
    State(state): State<Arc<AppState>>,
    request: Result<Json<ScheduleRequest>, JsonRejection>,
) -> ApiResult<Option<JobInfo>> {
    let Json(request) = request?;
    let interval = ScheduleInterval::from_hours(request.hours)?;
    state
        .registry
        .schedule(CRAWL_JOB, interval, state.controller.clone())
        .await;
    Ok(Json(state.registry.get(CRAWL_JOB).await))
}

pub async fn delete_schedule(State(state): State<Arc<AppState>>) -> StatusCode {
    if state.registry.cancel(CRAWL_JOB).await {
        StatusCode::NO_CONTENT
    } else {
        StatusCode::NOT_FOUND
    }
}
