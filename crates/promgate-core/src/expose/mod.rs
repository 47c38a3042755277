//! Exposition handler: admission, gather, negotiate, encode, finalize.
mod body;
mod response;

pub use response::{PLAIN_TEXT, ScrapeRequest, ScrapeResponse};

use std::{fmt, io, sync::Arc};

use prometheus::{CounterVec, Opts, proto::MetricFamily};
use tracing::{debug, trace};

use crate::{
    encode::EncodeError,
    error::{CoreError, FatalError},
    format::{Format, negotiate},
    gate::AdmissionGate,
    opts::HandlerOpts,
    policy::{ErrorSite, Escalation},
    registry::Gatherer,
};

use body::Body;

const ERRORS_NAME: &str = "promhttp_metric_handler_errors_total";
const ERRORS_HELP: &str =
    "Total number of internal errors encountered by the promhttp metric handler.";

/// Serves scrapes of one [`Gatherer`] according to [`HandlerOpts`].
///
/// `handle` runs synchronously on the caller's thread and is safe to call
/// concurrently; each call writes into its own body.
pub struct ExpositionHandler {
    gatherer: Arc<dyn Gatherer>,
    opts: HandlerOpts,
    gate: AdmissionGate,
    errors: CounterVec,
}

impl ExpositionHandler {
    /// Build a handler.
    ///
    /// When `opts.registry` is set the error counter is registered there; a counter
    /// registered earlier by another handler is reused. Any other registration
    /// failure is returned.
    pub fn new<G: Gatherer>(gatherer: G, opts: HandlerOpts) -> Result<Self, CoreError> {
        Self::from_shared(Arc::new(gatherer), opts)
    }

    /// Same as [`ExpositionHandler::new`] for an already shared gatherer.
    pub fn from_shared(gatherer: Arc<dyn Gatherer>, opts: HandlerOpts) -> Result<Self, CoreError> {
        let mut errors = CounterVec::new(Opts::new(ERRORS_NAME, ERRORS_HELP), &["cause"])?;
        if let Some(registry) = &opts.registry {
            for site in [ErrorSite::Gathering, ErrorSite::Encoding] {
                errors.with_label_values(&[site.as_label()]);
            }
            errors = registry.register_or_reuse(errors)?;
        }

        Ok(Self {
            gatherer,
            gate: AdmissionGate::new(opts.max_requests_in_flight),
            opts,
            errors,
        })
    }

    #[inline]
    pub fn opts(&self) -> &HandlerOpts {
        &self.opts
    }

    #[inline]
    pub fn gate(&self) -> &AdmissionGate {
        &self.gate
    }

    /// `promhttp_metric_handler_errors_total{cause}` used by this handler.
    #[inline]
    pub fn error_counter(&self) -> &CounterVec {
        &self.errors
    }

    /// Serve one scrape.
    ///
    /// Every non-fatal outcome is a [`ScrapeResponse`] (200, 500 or 503).
    /// `Err` is only returned under [`crate::ErrorHandling::PanicOnError`].
    pub fn handle(&self, req: &ScrapeRequest) -> Result<ScrapeResponse, FatalError> {
        let _permit = match self.gate.try_admit() {
            Ok(permit) => permit,
            Err(rejected) => {
                debug!(limit = rejected.limit, "scrape rejected by admission gate");
                return Ok(ScrapeResponse::unavailable(rejected.to_string()));
            }
        };

        let families = match self.gatherer.gather() {
            Ok(families) => families,
            Err(err) => {
                self.report(ErrorSite::Gathering, "error gathering metrics:", &err);
                match self
                    .opts
                    .error_handling
                    .on_gather_error(err.partial().is_empty())
                {
                    Escalation::Proceed => err.into_partial(),
                    Escalation::Abort => return Ok(ScrapeResponse::internal_error(&err)),
                    Escalation::Fatal => return Err(fatal(ErrorSite::Gathering, &err)),
                }
            }
        };

        let format = negotiate(
            req.accept.as_deref().unwrap_or(""),
            self.opts.enable_open_metrics,
        );
        trace!(%format, families = families.len(), "encoding scrape");

        let gzip = !self.opts.disable_compression && req.accepts_gzip();
        self.encode(format, &families, Body::new(gzip))
    }

    fn encode(
        &self,
        format: Format,
        families: &[MetricFamily],
        mut body: Body,
    ) -> Result<ScrapeResponse, FatalError> {
        let mut encoder = format.encoder();

        for mf in families {
            if let Err(err) = encoder.encode(mf, &mut body) {
                if self.on_encode_error(&err)? {
                    return self.abandon(format, body, &err);
                }
            }
        }

        if let Err(err) = encoder.close(&mut body) {
            if self.on_encode_error(&err)? {
                return self.abandon(format, body, &err);
            }
        }

        self.finish(format, body)
    }

    /// Response after an aborted encode.
    ///
    /// Before the first byte a 500 is still possible; afterwards the partial body is
    /// all the client gets, exactly as if the connection had been cut mid-stream.
    fn abandon(
        &self,
        format: Format,
        body: Body,
        err: &EncodeError,
    ) -> Result<ScrapeResponse, FatalError> {
        if body.written() == 0 {
            return Ok(ScrapeResponse::internal_error(err));
        }
        self.finish(format, body)
    }

    fn finish(&self, format: Format, body: Body) -> Result<ScrapeResponse, FatalError> {
        let content_encoding = body.content_encoding();
        self.finished(format, content_encoding, body.finish())
    }

    /// Build the 200 response, or a 500 if the body could not be completed.
    fn finished(
        &self,
        format: Format,
        content_encoding: Option<&'static str>,
        body: io::Result<Vec<u8>>,
    ) -> Result<ScrapeResponse, FatalError> {
        match body {
            Ok(bytes) => Ok(ScrapeResponse {
                status: 200,
                content_type: format.to_string(),
                content_encoding,
                body: bytes,
            }),
            Err(e) => {
                let err = EncodeError::Stream(e);
                self.on_encode_error(&err)?;
                Ok(ScrapeResponse::internal_error(&err))
            }
        }
    }

    /// Report an encode error; `Ok(true)` means stop sending.
    fn on_encode_error(&self, err: &EncodeError) -> Result<bool, FatalError> {
        self.report(
            ErrorSite::Encoding,
            "error encoding and sending metric family:",
            err,
        );
        match self.opts.error_handling.on_encode_error(err) {
            Escalation::Proceed => Ok(false),
            Escalation::Abort => Ok(true),
            Escalation::Fatal => Err(fatal(ErrorSite::Encoding, err)),
        }
    }

    fn report(&self, site: ErrorSite, prefix: &str, err: &dyn fmt::Display) {
        if let Some(log) = &self.opts.error_log {
            log.println(&format!("{prefix} {err}"));
        }
        self.errors.with_label_values(&[site.as_label()]).inc();
    }
}

impl fmt::Debug for ExpositionHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExpositionHandler")
            .field("opts", &self.opts)
            .field("gate", &self.gate)
            .finish_non_exhaustive()
    }
}

fn fatal(site: ErrorSite, err: &dyn fmt::Display) -> FatalError {
    FatalError {
        site,
        message: err.to_string(),
    }
}
