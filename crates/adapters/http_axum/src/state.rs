//! Shared application state for axum handlers.

use std::sync::Arc;

use quill_app::ports::{CounterStore, MessagePublisher};
use quill_app::services::metrics_service::MetricsService;

/// Application state shared across all axum handlers.
///
/// Generic over the counter store and publisher to avoid dynamic dispatch.
/// `Clone` is implemented manually so the underlying types themselves do not
/// need to be `Clone`; only the `Arc` is cloned.
pub struct AppState<C, P> {
    /// Likes, unlikes, views and metric reads.
    pub metrics_service: Arc<MetricsService<C, P>>,
}

impl<C, P> Clone for AppState<C, P> {
    fn clone(&self) -> Self {
        Self {
            metrics_service: Arc::clone(&self.metrics_service),
        }
    }
}

impl<C, P> AppState<C, P>
where
    C: CounterStore + Send + Sync + 'static,
    P: MessagePublisher + Send + Sync + 'static,
{
    /// Create a new application state from a service instance.
    pub fn new(metrics_service: MetricsService<C, P>) -> Self {
        Self::from_arc(Arc::new(metrics_service))
    }

    /// Create a new application state from a pre-wrapped service.
    pub fn from_arc(metrics_service: Arc<MetricsService<C, P>>) -> Self {
        Self { metrics_service }
    }
}
