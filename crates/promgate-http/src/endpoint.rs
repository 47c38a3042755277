use std::{panic, sync::Arc, time::Duration};

use axum::{
    extract::State,
    http::{
        HeaderMap, HeaderName, HeaderValue, StatusCode,
        header::{ACCEPT, ACCEPT_ENCODING, CONTENT_ENCODING, CONTENT_TYPE},
    },
    response::{IntoResponse, Response},
};
use promgate_core::{
    CoreError, ExpositionHandler, Gatherer, HandlerOpts, ScrapeRequest, ScrapeResponse,
    SharedRegistry,
};
use tracing::{error, warn};

/// Exposition handler bound to HTTP.
///
/// Cloning is cheap; clones serve through the same handler, so they share the
/// admission gate and the error counter.
#[derive(Clone, Debug)]
pub struct MetricsEndpoint {
    handler: Arc<ExpositionHandler>,
    timeout: Option<Duration>,
}

impl MetricsEndpoint {
    /// Wrap a handler; the timeout is taken from its options.
    pub fn new(handler: ExpositionHandler) -> Self {
        let timeout = handler.opts().effective_timeout();
        Self {
            handler: Arc::new(handler),
            timeout,
        }
    }

    /// Build the handler for `gatherer` and wrap it.
    pub fn for_gatherer<G: Gatherer>(gatherer: G, opts: HandlerOpts) -> Result<Self, CoreError> {
        Ok(Self::new(ExpositionHandler::new(gatherer, opts)?))
    }

    /// Serve `registry`, counting handler errors in the same registry unless `opts`
    /// names another one.
    pub fn for_registry(registry: SharedRegistry, mut opts: HandlerOpts) -> Result<Self, CoreError> {
        if opts.registry.is_none() {
            opts.registry = Some(registry.clone());
        }
        Self::for_gatherer(registry, opts)
    }

    #[inline]
    pub fn handler(&self) -> &ExpositionHandler {
        &self.handler
    }

    /// Run one scrape.
    ///
    /// Gathering and encoding are synchronous, so the scrape always runs on the
    /// blocking pool. With a timeout the client gets a 503 once the deadline passes.
    /// The scrape itself is not cancelled; its result is dropped when it eventually
    /// finishes.
    ///
    /// # Panics
    /// Under `ErrorHandling::PanicOnError` a gather or encode error panics here.
    pub async fn scrape(&self, req: ScrapeRequest) -> Response {
        let handler = self.handler.clone();
        let work = tokio::task::spawn_blocking(move || handler.handle(&req));

        let joined = match self.timeout {
            None => work.await,
            Some(timeout) => match tokio::time::timeout(timeout, work).await {
                Ok(joined) => joined,
                Err(_) => {
                    warn!(?timeout, "scrape exceeded timeout");
                    return into_response(ScrapeResponse::unavailable(format!(
                        "Exceeded configured timeout of {}.",
                        format_duration(timeout)
                    )));
                }
            },
        };

        match joined {
            Ok(Ok(resp)) => into_response(resp),
            Ok(Err(fatal)) => panic!("{fatal}"),
            Err(join) if join.is_panic() => panic::resume_unwind(join.into_panic()),
            Err(join) => {
                error!(error = %join, "scrape task did not complete");
                into_response(ScrapeResponse::internal_error(&join))
            }
        }
    }
}

/// Render `d` the way Prometheus clients print durations: `10ms`, `1.5s`, `2m0s`.
fn format_duration(d: Duration) -> String {
    let nanos = d.as_nanos();
    if nanos == 0 {
        return "0s".to_string();
    }
    if nanos < 1_000 {
        return format!("{nanos}ns");
    }
    if nanos < 1_000_000 {
        return format!("{}µs", fraction(nanos, 1_000));
    }
    if nanos < 1_000_000_000 {
        return format!("{}ms", fraction(nanos, 1_000_000));
    }

    let secs = d.as_secs();
    let (hours, minutes) = (secs / 3600, secs / 60 % 60);
    let sub_minute = u128::from(secs % 60) * 1_000_000_000 + u128::from(d.subsec_nanos());
    let seconds = fraction(sub_minute, 1_000_000_000);
    match (hours, minutes) {
        (0, 0) => format!("{seconds}s"),
        (0, m) => format!("{m}m{seconds}s"),
        (h, m) => format!("{h}h{m}m{seconds}s"),
    }
}

/// `value / unit` with the remainder as a decimal fraction, trailing zeros dropped.
fn fraction(value: u128, unit: u128) -> String {
    let (whole, rest) = (value / unit, value % unit);
    if rest == 0 {
        return whole.to_string();
    }
    let width = unit.ilog10() as usize;
    let digits = format!("{rest:0width$}");
    format!("{whole}.{}", digits.trim_end_matches('0'))
}

/// axum handler serving [`MetricsEndpoint`] state.
pub async fn serve_metrics(State(endpoint): State<MetricsEndpoint>, headers: HeaderMap) -> Response {
    endpoint.scrape(scrape_request(&headers)).await
}

fn scrape_request(headers: &HeaderMap) -> ScrapeRequest {
    ScrapeRequest {
        accept: header(headers, ACCEPT),
        accept_encoding: header(headers, ACCEPT_ENCODING),
    }
}

fn header(headers: &HeaderMap, name: HeaderName) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

fn into_response(resp: ScrapeResponse) -> Response {
    let status = StatusCode::from_u16(resp.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

    let mut headers = HeaderMap::new();
    match HeaderValue::try_from(resp.content_type) {
        Ok(v) => {
            headers.insert(CONTENT_TYPE, v);
        }
        Err(e) => warn!(error = %e, "invalid content type for scrape response"),
    }
    if let Some(encoding) = resp.content_encoding {
        headers.insert(CONTENT_ENCODING, HeaderValue::from_static(encoding));
    }

    (status, headers, resp.body).into_response()
}
