//! Axum router assembly.

use axum::Router;
use axum::routing::get;
use tower_http::trace::TraceLayer;

use quill_app::ports::{CounterStore, MessagePublisher};

use crate::state::AppState;

/// Build the top-level axum [`Router`].
///
/// Nests the metrics API under `/api` and exposes `/health`.
/// Includes a [`TraceLayer`] that logs each HTTP request/response at the
/// `DEBUG` level using the `tracing` ecosystem.
pub fn build<C, P>(state: AppState<C, P>) -> Router
where
    C: CounterStore + Send + Sync + 'static,
    P: MessagePublisher + Send + Sync + 'static,
{
    Router::new()
        .route("/health", get(health_check))
        .nest("/api", crate::api::routes())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health_check() -> &'static str {
    "OK"
}
