//! In-flight admission gate.
//!
//! Bounds the number of concurrently served scrapes. Acquisition never waits:
//! an exhausted gate rejects the request so latency stays predictable under overload.
use std::sync::Arc;

use thiserror::Error;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

/// Returned when every slot is taken. The message is sent verbatim with a 503.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("Limit of concurrent requests reached ({limit}), try again later.")]
pub struct AdmissionRejected {
    pub limit: usize,
}

/// Slot held for the duration of one scrape. Released on drop.
#[derive(Debug)]
pub struct AdmissionPermit {
    _slot: Option<OwnedSemaphorePermit>,
}

/// Non-blocking bounded slot pool.
#[derive(Debug, Clone)]
pub struct AdmissionGate {
    slots: Option<Arc<Semaphore>>,
    limit: usize,
}

impl AdmissionGate {
    /// Gate with `max_in_flight` slots; zero or negative means unlimited.
    pub fn new(max_in_flight: i64) -> Self {
        if max_in_flight <= 0 {
            return Self::unlimited();
        }
        let limit = usize::try_from(max_in_flight)
            .unwrap_or(usize::MAX)
            .min(Semaphore::MAX_PERMITS);

        Self {
            slots: Some(Arc::new(Semaphore::new(limit))),
            limit,
        }
    }

    /// Gate that admits everything.
    pub fn unlimited() -> Self {
        Self {
            slots: None,
            limit: 0,
        }
    }

    /// Configured limit, `None` when unlimited.
    #[inline]
    pub fn limit(&self) -> Option<usize> {
        self.slots.as_ref().map(|_| self.limit)
    }

    /// Currently free slots, `None` when unlimited.
    pub fn available(&self) -> Option<usize> {
        self.slots.as_ref().map(|s| s.available_permits())
    }

    /// Take a slot without waiting.
    pub fn try_admit(&self) -> Result<AdmissionPermit, AdmissionRejected> {
        let Some(slots) = &self.slots else {
            return Ok(AdmissionPermit { _slot: None });
        };
        match slots.clone().try_acquire_owned() {
            Ok(slot) => Ok(AdmissionPermit { _slot: Some(slot) }),
            Err(_) => Err(AdmissionRejected { limit: self.limit }),
        }
    }
}
