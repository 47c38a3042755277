//! Framework-agnostic core of the promgate metrics exposition middleware.
//!
//! The crate turns a [`Gatherer`] snapshot into a scrape response:
//! admission control, content negotiation, error policy and per-family encoding.
//! HTTP framework adapters (see `promgate-http`) only translate requests and responses.
//!
//! ## Example
//! ```rust
//! use prometheus::{IntCounter, Registry};
//! use promgate_core::{ExpositionHandler, HandlerOpts, ScrapeRequest};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let registry = Registry::new();
//! let jobs = IntCounter::new("jobs_processed_total", "Jobs processed")?;
//! registry.register(Box::new(jobs.clone()))?;
//! jobs.inc();
//!
//! let handler = ExpositionHandler::new(registry, HandlerOpts::default())?;
//! let response = handler.handle(&ScrapeRequest::default())?;
//!
//! assert_eq!(response.status, 200);
//! assert!(response.body_text().contains("jobs_processed_total 1"));
//! # Ok(())
//! # }
//! ```
//!
//! ## Self-instrumentation
//! - `promhttp_metric_handler_errors_total{cause}` - Counter, `cause` is "gathering" or "encoding"
//! - `promhttp_metric_handler_requests_total{code}` - Counter, see [`StatusCounter`]
//! - `promhttp_metric_handler_requests_in_flight` - Gauge, see [`InFlightGauge`]

pub mod encode;
pub mod error;
pub mod expose;
pub mod format;
pub mod gate;
pub mod instrument;
pub mod opts;
pub mod policy;
pub mod registry;

pub use encode::{EncodeError, FamilyEncoder};
pub use error::{CoreError, FatalError, RegistryError};
pub use expose::{ExpositionHandler, ScrapeRequest, ScrapeResponse};
pub use format::{Format, OpenMetricsVersion, negotiate};
pub use gate::{AdmissionGate, AdmissionPermit, AdmissionRejected};
pub use instrument::{InFlightGauge, InFlightGuard, RequestMetrics, StatusCounter};
pub use opts::{ErrorLog, HandlerConfig, HandlerOpts, TracingErrorLog};
pub use policy::{ErrorHandling, ErrorSite, Escalation};
pub use registry::{GatherError, GatherFn, Gatherer, Gatherers, SharedRegistry};

pub use prometheus::proto::MetricFamily;
