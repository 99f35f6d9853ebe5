//! JSON REST API handler modules.

#[allow(clippy::missing_errors_doc)]
pub mod metrics;

use std::str::FromStr;

use axum::Router;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum::routing::{get, post};

use quill_app::ports::{CounterStore, MessagePublisher};
use quill_domain::error::{QuillError, ValidationError};
use quill_domain::id::{PostId, UserId};

use crate::error::ApiError;
use crate::state::AppState;

/// Header carrying the authenticated user id, set by the upstream auth layer.
pub const USER_HEADER: &str = "x-user-id";

/// Build the `/api` sub-router.
pub fn routes<C, P>() -> Router<AppState<C, P>>
where
    C: CounterStore + Send + Sync + 'static,
    P: MessagePublisher + Send + Sync + 'static,
{
    Router::new()
        .route("/posts/{id}/metrics", get(metrics::get_metrics::<C, P>))
        .route("/posts/{id}/views", post(metrics::record_view::<C, P>))
        .route(
            "/posts/{id}/like",
            get(metrics::is_liked::<C, P>)
                .post(metrics::like::<C, P>)
                .delete(metrics::unlike::<C, P>),
        )
}

fn invalid_id(raw: &str) -> ApiError {
    ApiError::from(QuillError::from(ValidationError::InvalidId(raw.to_string())))
}

/// Parse a post id taken from the path.
pub(crate) fn parse_post_id(raw: &str) -> Result<PostId, ApiError> {
    PostId::from_str(raw).map_err(|_| invalid_id(raw))
}

/// The user a request acts on behalf of.
#[derive(Debug, Clone, Copy)]
pub struct ActingUser(pub UserId);

impl<S: Send + Sync> FromRequestParts<S> for ActingUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let raw = parts
            .headers
            .get(USER_HEADER)
            .and_then(|value| value.to_str().ok())
            .ok_or_else(|| invalid_id(USER_HEADER))?;
        UserId::from_str(raw.trim())
            .map(Self)
            .map_err(|_| invalid_id(raw))
    }
}
