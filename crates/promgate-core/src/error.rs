use thiserror::Error;

use crate::policy::ErrorSite;

/// Errors raised while building handlers and instrumentation.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("metric construction failed: {0}")]
    Metric(#[from] prometheus::Error),

    #[error("collector registration failed: {0}")]
    Registration(#[from] RegistryError),

    #[error("unknown error handling mode: {0}")]
    UnknownErrorHandling(String),
}

/// Errors returned by [`crate::SharedRegistry`].
#[derive(Debug, Error)]
pub enum RegistryError {
    /// A collector with the same descriptors is already registered.
    #[error("collector already registered: {name}")]
    AlreadyRegistered { name: String },

    /// A collector with the same descriptors exists but has a different concrete type.
    #[error("collector {name} is registered with a different type")]
    Conflict { name: String },

    /// The collector was registered on the inner registry directly, so its instance cannot be adopted.
    #[error("collector {name} was registered outside of the shared registry")]
    Foreign { name: String },

    #[error(transparent)]
    Prometheus(prometheus::Error),
}

/// Fatal, non-recoverable exposition failure.
///
/// Only produced under [`crate::ErrorHandling::PanicOnError`].
/// Callers decide whether this ends the process; the HTTP adapter turns it into a panic of the request task.
#[derive(Debug, Error)]
#[error("fatal error while {site} metrics: {message}")]
pub struct FatalError {
    pub site: ErrorSite,
    pub message: String,
}
