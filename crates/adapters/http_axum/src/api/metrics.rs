//! JSON REST handlers for post metrics.

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

use quill_app::ports::{CounterStore, MessagePublisher};
use quill_domain::metrics::PostMetrics;

use super::{ActingUser, parse_post_id};
use crate::error::ApiError;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct ViewsBody {
    /// `null` when the view could not be counted.
    pub views: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct LikesBody {
    pub likes: i64,
}

#[derive(Debug, Serialize)]
pub struct LikedBody {
    pub liked: bool,
}

/// Possible responses from the metrics endpoint.
pub enum MetricsResponse {
    Ok(Json<PostMetrics>),
}

impl IntoResponse for MetricsResponse {
    fn into_response(self) -> Response {
        match self {
            Self::Ok(json) => json.into_response(),
        }
    }
}

/// Possible responses from the view endpoint.
pub enum ViewResponse {
    Accepted(Json<ViewsBody>),
}

impl IntoResponse for ViewResponse {
    fn into_response(self) -> Response {
        match self {
            Self::Accepted(json) => (StatusCode::ACCEPTED, json).into_response(),
        }
    }
}

/// Possible responses from the like and unlike endpoints.
pub enum LikeResponse {
    Ok(Json<LikesBody>),
}

impl IntoResponse for LikeResponse {
    fn into_response(self) -> Response {
        match self {
            Self::Ok(json) => json.into_response(),
        }
    }
}

/// Possible responses from the like-status endpoint.
pub enum LikedResponse {
    Ok(Json<LikedBody>),
}

impl IntoResponse for LikedResponse {
    fn into_response(self) -> Response {
        match self {
            Self::Ok(json) => json.into_response(),
        }
    }
}

/// `GET /api/posts/:id/metrics`
pub async fn get_metrics<C, P>(
    State(state): State<AppState<C, P>>,
    Path(id): Path<String>,
) -> Result<MetricsResponse, ApiError>
where
    C: CounterStore + Send + Sync + 'static,
    P: MessagePublisher + Send + Sync + 'static,
{
    let post_id = parse_post_id(&id)?;
    let metrics = state.metrics_service.get_metrics(post_id).await?;
    Ok(MetricsResponse::Ok(Json(metrics)))
}

/// `POST /api/posts/:id/views`
pub async fn record_view<C, P>(
    State(state): State<AppState<C, P>>,
    Path(id): Path<String>,
) -> Result<ViewResponse, ApiError>
where
    C: CounterStore + Send + Sync + 'static,
    P: MessagePublisher + Send + Sync + 'static,
{
    let post_id = parse_post_id(&id)?;
    let views = state.metrics_service.record_view(post_id).await;
    Ok(ViewResponse::Accepted(Json(ViewsBody { views })))
}

/// `POST /api/posts/:id/like`
pub async fn like<C, P>(
    State(state): State<AppState<C, P>>,
    ActingUser(user_id): ActingUser,
    Path(id): Path<String>,
) -> Result<LikeResponse, ApiError>
where
    C: CounterStore + Send + Sync + 'static,
    P: MessagePublisher + Send + Sync + 'static,
{
    let post_id = parse_post_id(&id)?;
    let likes = state.metrics_service.like(user_id, post_id).await?;
    Ok(LikeResponse::Ok(Json(LikesBody { likes })))
}

/// `DELETE /api/posts/:id/like`
pub async fn unlike<C, P>(
    State(state): State<AppState<C, P>>,
    ActingUser(user_id): ActingUser,
    Path(id): Path<String>,
) -> Result<LikeResponse, ApiError>
where
    C: CounterStore + Send + Sync + 'static,
    P: MessagePublisher + Send + Sync + 'static,
{
    let post_id = parse_post_id(&id)?;
    let likes = state.metrics_service.unlike(user_id, post_id).await?;
    Ok(LikeResponse::Ok(Json(LikesBody { likes })))
}

/// `GET /api/posts/:id/like`
pub async fn is_liked<C, P>(
    State(state): State<AppState<C, P>>,
    ActingUser(user_id): ActingUser,
    Path(id): Path<String>,
) -> Result<LikedResponse, ApiError>
where
    C: CounterStore + Send + Sync + 'static,
    P: MessagePublisher + Send + Sync + 'static,
{
    let post_id = parse_post_id(&id)?;
    let liked = state.metrics_service.is_liked(user_id, post_id).await?;
    Ok(LikedResponse::Ok(Json(LikedBody { liked })))
}
