//! Request outcome metrics for HTTP handlers.
//!
//! ## Metrics
//! - `promhttp_metric_handler_requests_total{code}` - Counter of finished requests
//! - `promhttp_metric_handler_requests_in_flight` - Gauge of requests being served
//!
//! ## Label cardinality
//! `code` is bounded: one of [`KNOWN_STATUS_CODES`], [`REQUEST_OTHER`] or [`REQUEST_ALL`].
use prometheus::{CounterVec, Gauge, Opts};
use tracing::warn;

use crate::{error::CoreError, registry::SharedRegistry};

/// Status codes counted under their own label.
pub const KNOWN_STATUS_CODES: [u16; 18] = [
    200, 302, 303, 304, 305, 307, 308, 400, 401, 403, 404, 405, 500, 501, 502, 503, 504, 505,
];

/// Label for status codes outside [`KNOWN_STATUS_CODES`].
pub const REQUEST_OTHER: &str = "Other";
/// Label counting every request.
pub const REQUEST_ALL: &str = "All";

const REQUESTS_NAME: &str = "promhttp_metric_handler_requests_total";
const REQUESTS_HELP: &str = "Total number of scrapes by HTTP status code.";
const IN_FLIGHT_NAME: &str = "promhttp_metric_handler_requests_in_flight";
const IN_FLIGHT_HELP: &str = "Current number of scrapes being served.";

/// Label value for a response status.
pub fn status_label(status: u16) -> &'static str {
    match status {
        200 => "200",
        302 => "302",
        303 => "303",
        304 => "304",
        305 => "305",
        307 => "307",
        308 => "308",
        400 => "400",
        401 => "401",
        403 => "403",
        404 => "404",
        405 => "405",
        500 => "500",
        501 => "501",
        502 => "502",
        503 => "503",
        504 => "504",
        505 => "505",
        _ => REQUEST_OTHER,
    }
}

/// Per-status request counter.
#[derive(Clone, Debug)]
pub struct StatusCounter {
    requests: CounterVec,
}

impl StatusCounter {
    /// Unregistered counter with every label value initialised at zero.
    pub fn new() -> Result<Self, CoreError> {
        let requests = CounterVec::new(Opts::new(REQUESTS_NAME, REQUESTS_HELP), &["code"])?;
        for code in KNOWN_STATUS_CODES {
            requests.with_label_values(&[status_label(code)]);
        }
        requests.with_label_values(&[REQUEST_OTHER]);
        requests.with_label_values(&[REQUEST_ALL]);
        Ok(Self { requests })
    }

    /// Counter registered in `registry`, or the one registered there before.
    pub fn register(registry: &SharedRegistry) -> Result<Self, CoreError> {
        let requests = registry.register_or_reuse(Self::new()?.requests)?;
        Ok(Self { requests })
    }

    /// Count one finished request. Failures are logged and swallowed.
    pub fn record(&self, status: u16) {
        for label in [status_label(status), REQUEST_ALL] {
            match self.requests.get_metric_with_label_values(&[label]) {
                Ok(counter) => counter.inc(),
                Err(e) => warn!(status, label, error = %e, "failed to record request outcome"),
            }
        }
    }

    /// Current value for a label, `0.0` for unknown labels.
    pub fn get(&self, label: &str) -> f64 {
        self.requests
            .get_metric_with_label_values(&[label])
            .map(|c| c.get())
            .unwrap_or_default()
    }

    #[inline]
    pub fn counter(&self) -> &CounterVec {
        &self.requests
    }
}

/// Gauge of requests currently being served.
#[derive(Clone, Debug)]
pub struct InFlightGauge {
    gauge: Gauge,
}

impl InFlightGauge {
    pub fn new() -> Result<Self, CoreError> {
        Ok(Self {
            gauge: Gauge::new(IN_FLIGHT_NAME, IN_FLIGHT_HELP)?,
        })
    }

    /// Gauge registered in `registry`, or the one registered there before.
    pub fn register(registry: &SharedRegistry) -> Result<Self, CoreError> {
        let gauge = registry.register_or_reuse(Self::new()?.gauge)?;
        Ok(Self { gauge })
    }

    /// Increment now, decrement when the guard drops (also while unwinding).
    #[must_use = "the request stops being counted when the guard is dropped"]
    pub fn track(&self) -> InFlightGuard {
        self.gauge.inc();
        InFlightGuard {
            gauge: self.gauge.clone(),
        }
    }

    #[inline]
    pub fn get(&self) -> f64 {
        self.gauge.get()
    }
}

/// RAII handle returned by [`InFlightGauge::track`].
#[derive(Debug)]
pub struct InFlightGuard {
    gauge: Gauge,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.gauge.dec();
    }
}

/// Both request metrics, as used by the HTTP middleware.
#[derive(Clone, Debug)]
pub struct RequestMetrics {
    pub status: StatusCounter,
    pub in_flight: InFlightGauge,
}

impl RequestMetrics {
    /// Unregistered pair, useful when the caller exports them some other way.
    pub fn new() -> Result<Self, CoreError> {
        Ok(Self {
            status: StatusCounter::new()?,
            in_flight: InFlightGauge::new()?,
        })
    }

    pub fn register(registry: &SharedRegistry) -> Result<Self, CoreError> {
        Ok(Self {
            status: StatusCounter::register(registry)?,
            in_flight: InFlightGauge::register(registry)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::panic::{AssertUnwindSafe, catch_unwind};

    #[test]
    fn known_and_unknown_codes_are_bucketed() {
        let counter = StatusCounter::new().unwrap();
        for status in [404, 404, 404, 503, 418] {
            counter.record(status);
        }

        assert_eq!(counter.get("404"), 3.0);
        assert_eq!(counter.get("503"), 1.0);
        assert_eq!(counter.get(REQUEST_OTHER), 1.0);
        assert_eq!(counter.get(REQUEST_ALL), 5.0);
        assert_eq!(counter.get("200"), 0.0);
    }

    #[test]
    fn every_label_is_exported_before_first_request() {
        let registry = SharedRegistry::new();
        StatusCounter::register(&registry).unwrap();

        let families = registry.registry().gather();
        let requests = families
            .iter()
            .find(|f| f.name() == REQUESTS_NAME)
            .expect("request counter not exported");
        assert_eq!(requests.get_metric().len(), KNOWN_STATUS_CODES.len() + 2);
    }

    #[test]
    fn status_label_matches_allow_list() {
        for code in KNOWN_STATUS_CODES {
            assert_eq!(status_label(code), code.to_string());
        }
        assert_eq!(status_label(201), REQUEST_OTHER);
        assert_eq!(status_label(429), REQUEST_OTHER);
    }

    #[test]
    fn registration_reuses_existing_metrics() {
        let registry = SharedRegistry::new();
        let first = RequestMetrics::register(&registry).unwrap();
        let second = RequestMetrics::register(&registry).unwrap();

        second.status.record(200);
        let _guard = second.in_flight.track();

        assert_eq!(first.status.get("200"), 1.0);
        assert_eq!(first.in_flight.get(), 1.0);
    }

    #[test]
    fn guard_decrements_on_drop_and_unwind() {
        let gauge = InFlightGauge::new().unwrap();

        {
            let _a = gauge.track();
            let _b = gauge.track();
            assert_eq!(gauge.get(), 2.0);
        }
        assert_eq!(gauge.get(), 0.0);

        let res = catch_unwind(AssertUnwindSafe(|| {
            let _guard = gauge.track();
            panic!("handler blew up");
        }));
        assert!(res.is_err());
        assert_eq!(gauge.get(), 0.0);
    }
}
