use axum::{Router, middleware::from_fn_with_state, routing::any};
use promgate_core::{CoreError, RequestMetrics, SharedRegistry};

use crate::{
    endpoint::{MetricsEndpoint, serve_metrics},
    middleware::{count_status, track_in_flight},
};

/// Router serving `endpoint` at `path` for every HTTP method.
pub fn metrics_router(path: &str, endpoint: MetricsEndpoint) -> Router {
    Router::new()
        .route(path, any(serve_metrics))
        .with_state(endpoint)
}

/// Wrap every route of `router` with the status counter (outer) and the
/// in-flight gauge (inner).
pub fn instrument_router<S>(router: Router<S>, metrics: RequestMetrics) -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    router
        .layer(from_fn_with_state(metrics.in_flight, track_in_flight))
        .layer(from_fn_with_state(metrics.status, count_status))
}

/// Register the request metrics in `registry`, reusing ones registered before,
/// and instrument `router` with them.
///
/// Usually `router` is the one returned by [`metrics_router`], so the metrics
/// endpoint reports its own scrapes.
pub fn instrument_metric_handler(
    registry: &SharedRegistry,
    router: Router,
) -> Result<Router, CoreError> {
    let metrics = RequestMetrics::register(registry)?;
    Ok(instrument_router(router, metrics))
}
