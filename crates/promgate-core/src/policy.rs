use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::{encode::EncodeError, error::CoreError};

/// Defines how the exposition handler reacts to gather and encode errors.
///
/// Errors are logged and counted regardless of the selected mode;
/// the mode only decides what the scraping client gets to see.
///
/// Modes:
/// - `HttpErrorOnError`: answer 500 with the error text on the first error, or stop sending if the body has already started.
/// - `ContinueOnError`: serve whatever could be gathered and skip families the encoder rejects; answer 500 only if nothing was gathered.
/// - `PanicOnError`: end request handling with a [`crate::FatalError`] ("crash only" deployments).
#[derive(Default, Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ErrorHandling {
    /// Serve HTTP 500 upon the first error.
    #[default]
    #[serde(alias = "http-error", alias = "http")]
    HttpErrorOnError,
    /// Best effort: serve as many metrics as possible.
    #[serde(alias = "continue")]
    ContinueOnError,
    /// Fail fast with a fatal error.
    #[serde(alias = "panic")]
    PanicOnError,
}

impl FromStr for ErrorHandling {
    type Err = CoreError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "http-error-on-error" | "http-error" | "http" | "" => Ok(ErrorHandling::HttpErrorOnError),
            "continue-on-error" | "continue" => Ok(ErrorHandling::ContinueOnError),
            "panic-on-error" | "panic" => Ok(ErrorHandling::PanicOnError),
            other => Err(CoreError::UnknownErrorHandling(other.to_string())),
        }
    }
}

/// Where an error was detected; doubles as the `cause` label value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorSite {
    Gathering,
    Encoding,
}

impl ErrorSite {
    #[inline]
    pub fn as_label(&self) -> &'static str {
        match self {
            ErrorSite::Gathering => "gathering",
            ErrorSite::Encoding => "encoding",
        }
    }
}

impl fmt::Display for ErrorSite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_label())
    }
}

/// What the handler does after an error was reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Escalation {
    /// Keep going (with partial results or the next family).
    Proceed,
    /// Stop; answer 500 if nothing has been written yet.
    Abort,
    /// Stop with a [`crate::FatalError`].
    Fatal,
}

impl ErrorHandling {
    /// Decide after a failed gather; `partial_is_empty` tells whether anything was collected.
    pub fn on_gather_error(self, partial_is_empty: bool) -> Escalation {
        match self {
            ErrorHandling::PanicOnError => Escalation::Fatal,
            ErrorHandling::ContinueOnError if !partial_is_empty => Escalation::Proceed,
            ErrorHandling::ContinueOnError | ErrorHandling::HttpErrorOnError => Escalation::Abort,
        }
    }

    /// Decide after a failed family encode or stream close.
    ///
    /// A broken stream aborts under every non-fatal mode.
    pub fn on_encode_error(self, err: &EncodeError) -> Escalation {
        match self {
            ErrorHandling::PanicOnError => Escalation::Fatal,
            ErrorHandling::ContinueOnError if !err.is_stream() => Escalation::Proceed,
            ErrorHandling::ContinueOnError | ErrorHandling::HttpErrorOnError => Escalation::Abort,
        }
    }
}
