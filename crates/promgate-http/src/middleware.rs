use std::{any::Any, panic::AssertUnwindSafe};

use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
};
use futures_util::FutureExt;
use promgate_core::{InFlightGauge, StatusCounter};
use tracing::error;

/// Count every finished request by status.
///
/// A panic further down the stack is logged, answered with 500 and counted as 500.
pub async fn count_status(
    State(counter): State<StatusCounter>,
    req: Request,
    next: Next,
) -> Response {
    let method = req.method().clone();
    let path = req.uri().path().to_string();

    let response = match AssertUnwindSafe(next.run(req)).catch_unwind().await {
        Ok(response) => response,
        Err(panic) => {
            error!(%method, %path, panic = panic_message(panic.as_ref()), "handler panicked");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    };

    counter.record(response.status().as_u16());
    response
}

/// Keep the gauge incremented while the request is served.
///
/// The guard also decrements when the request future is dropped or unwinds.
pub async fn track_in_flight(
    State(gauge): State<InFlightGauge>,
    req: Request,
    next: Next,
) -> Response {
    let _in_flight = gauge.track();
    next.run(req).await
}

fn panic_message(panic: &(dyn Any + Send)) -> &str {
    panic
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| panic.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("non-string panic payload")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn panic_payloads_are_readable() {
        let literal: Box<dyn Any + Send> = Box::new("static message");
        let owned: Box<dyn Any + Send> = Box::new(String::from("owned message"));
        let other: Box<dyn Any + Send> = Box::new(42_u8);

        assert_eq!(panic_message(literal.as_ref()), "static message");
        assert_eq!(panic_message(owned.as_ref()), "owned message");
        assert_eq!(panic_message(other.as_ref()), "non-string panic payload");
    }
}
