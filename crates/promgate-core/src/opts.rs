use std::{fmt, sync::Arc, time::Duration};

use serde::{Deserialize, Serialize};
use tracing::error;

use crate::{policy::ErrorHandling, registry::SharedRegistry};

/// Minimal println-style sink for handler errors.
pub trait ErrorLog: Send + Sync + 'static {
    fn println(&self, message: &str);
}

impl<F> ErrorLog for F
where
    F: Fn(&str) + Send + Sync + 'static,
{
    fn println(&self, message: &str) {
        self(message)
    }
}

/// [`ErrorLog`] that forwards to `tracing::error!`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingErrorLog;

impl ErrorLog for TracingErrorLog {
    fn println(&self, message: &str) {
        error!(target: "promgate::handler", "{message}");
    }
}

/// Options for one exposition handler.
///
/// The default value is a reasonable configuration: no logging, HTTP 500 on errors,
/// no self-instrumentation, compression allowed, no concurrency limit, no timeout,
/// OpenMetrics disabled.
#[derive(Clone, Default)]
pub struct HandlerOpts {
    /// Sink for gather/encode errors. `None` disables error logging.
    pub error_log: Option<Arc<dyn ErrorLog>>,
    /// Reaction to errors; errors are logged and counted regardless.
    pub error_handling: ErrorHandling,
    /// Registry for `promhttp_metric_handler_errors_total`. `None` keeps the counter unexported.
    pub registry: Option<SharedRegistry>,
    /// Never compress responses, even if the client asks for it.
    pub disable_compression: bool,
    /// Concurrent scrape limit; zero or negative means unlimited.
    pub max_requests_in_flight: i64,
    /// Scrape deadline; zero means none. Work past the deadline keeps running in the background.
    pub timeout: Duration,
    /// Offer OpenMetrics during content negotiation.
    pub enable_open_metrics: bool,
}

impl HandlerOpts {
    pub fn with_error_log(mut self, log: impl ErrorLog) -> Self {
        self.error_log = Some(Arc::new(log));
        self
    }

    pub fn with_registry(mut self, registry: SharedRegistry) -> Self {
        self.registry = Some(registry);
        self
    }

    pub fn with_error_handling(mut self, mode: ErrorHandling) -> Self {
        self.error_handling = mode;
        self
    }

    pub fn with_max_requests_in_flight(mut self, limit: i64) -> Self {
        self.max_requests_in_flight = limit;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_open_metrics(mut self, enabled: bool) -> Self {
        self.enable_open_metrics = enabled;
        self
    }

    pub fn with_compression(mut self, enabled: bool) -> Self {
        self.disable_compression = !enabled;
        self
    }

    /// Timeout to enforce, `None` when disabled.
    #[inline]
    pub fn effective_timeout(&self) -> Option<Duration> {
        (!self.timeout.is_zero()).then_some(self.timeout)
    }
}

impl fmt::Debug for HandlerOpts {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerOpts")
            .field("error_log", &self.error_log.is_some())
            .field("error_handling", &self.error_handling)
            .field("registry", &self.registry)
            .field("disable_compression", &self.disable_compression)
            .field("max_requests_in_flight", &self.max_requests_in_flight)
            .field("timeout", &self.timeout)
            .field("enable_open_metrics", &self.enable_open_metrics)
            .finish()
    }
}

/// Serializable part of [`HandlerOpts`].
///
/// Runtime collaborators (logger, registry) are attached after conversion.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct HandlerConfig {
    pub error_handling: ErrorHandling,
    pub disable_compression: bool,
    /// Zero or negative: unlimited.
    pub max_requests_in_flight: i64,
    /// Zero or negative: no timeout.
    pub timeout_ms: i64,
    pub enable_open_metrics: bool,
}

impl From<HandlerConfig> for HandlerOpts {
    fn from(cfg: HandlerConfig) -> Self {
        let timeout = u64::try_from(cfg.timeout_ms)
            .map(Duration::from_millis)
            .unwrap_or(Duration::ZERO);

        HandlerOpts {
            error_handling: cfg.error_handling,
            disable_compression: cfg.disable_compression,
            max_requests_in_flight: cfg.max_requests_in_flight,
            timeout,
            enable_open_metrics: cfg.enable_open_metrics,
            ..HandlerOpts::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[test]
    fn default_opts() {
        let opts = HandlerOpts::default();

        assert!(opts.error_log.is_none());
        assert!(opts.registry.is_none());
        assert_eq!(opts.error_handling, ErrorHandling::HttpErrorOnError);
        assert_eq!(opts.effective_timeout(), None);
        assert!(!opts.disable_compression);
        assert!(!opts.enable_open_metrics);
    }

    #[test]
    fn closures_are_error_logs() {
        let seen = Arc::new(Mutex::new(Vec::<String>::new()));
        let sink = seen.clone();
        let opts = HandlerOpts::default().with_error_log(move |m: &str| {
            sink.lock().unwrap().push(m.to_string());
        });

        opts.error_log.as_ref().unwrap().println("boom");
        assert_eq!(seen.lock().unwrap().as_slice(), ["boom"]);
    }

    #[test]
    fn config_uses_defaults_for_missing_fields() {
        let cfg: HandlerConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(cfg, HandlerConfig::default());
    }

    #[test]
    fn config_converts_into_opts() {
        let json = r#"{
            "error_handling": "continue",
            "max_requests_in_flight": 4,
            "timeout_ms": 250,
            "enable_open_metrics": true,
            "disable_compression": true
        }"#;
        let cfg: HandlerConfig = serde_json::from_str(json).unwrap();
        let opts = HandlerOpts::from(cfg);

        assert_eq!(opts.error_handling, ErrorHandling::ContinueOnError);
        assert_eq!(opts.max_requests_in_flight, 4);
        assert_eq!(opts.effective_timeout(), Some(Duration::from_millis(250)));
        assert!(opts.enable_open_metrics);
        assert!(opts.disable_compression);
    }

    #[test]
    fn negative_timeout_disables_deadline() {
        let cfg = HandlerConfig {
            timeout_ms: -5,
            ..Default::default()
        };
        assert_eq!(HandlerOpts::from(cfg).effective_timeout(), None);
    }

    #[test]
    fn config_rejects_unknown_mode() {
        let res = serde_json::from_str::<HandlerConfig>(r#"{"error_handling": "retry"}"#);
        assert!(res.is_err());
    }
}
