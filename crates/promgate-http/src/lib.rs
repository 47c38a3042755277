//! axum adapter for promgate.
//!
//! - [`MetricsEndpoint`] serves an [`ExpositionHandler`](promgate_core::ExpositionHandler),
//!   enforcing the configured scrape timeout.
//! - [`metrics_router`] mounts the endpoint on a [`Router`](axum::Router) for any method.
//! - [`instrument_metric_handler`] adds the request counter and in-flight gauge.
//!
//! ## Example
//! ```rust,ignore
//! let registry = SharedRegistry::new();
//! let endpoint = MetricsEndpoint::for_registry(registry.clone(), HandlerOpts::default())?;
//! let app = instrument_metric_handler(&registry, metrics_router("/metrics", endpoint))?;
//! axum::serve(listener, app).await?;
//! ```
mod endpoint;
mod middleware;
mod router;

pub use endpoint::{MetricsEndpoint, serve_metrics};
pub use middleware::{count_status, track_in_flight};
pub use router::{instrument_metric_handler, instrument_router, metrics_router};
