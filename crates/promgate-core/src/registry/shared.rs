use std::{
    any::Any,
    collections::HashMap,
    fmt,
    sync::{Arc, Mutex, MutexGuard},
};

use prometheus::{Registry, core::Collector, proto::MetricFamily};
use tracing::debug;

use crate::{
    error::RegistryError,
    registry::{GatherError, Gatherer},
};

type Adopted = HashMap<String, Box<dyn Any + Send + Sync>>;

/// Prometheus registry with idempotent registration.
///
/// Remembers every collector registered through it, keyed by its descriptor names,
/// so a second registration of the same collector can hand back the instance that is
/// actually being exported (see [`SharedRegistry::register_or_reuse`]).
///
/// Cloning is cheap; clones share the registry and the bookkeeping.
#[derive(Clone)]
pub struct SharedRegistry {
    inner: Registry,
    adopted: Arc<Mutex<Adopted>>,
}

impl Default for SharedRegistry {
    fn default() -> Self {
        Self::from_registry(Registry::new())
    }
}

impl SharedRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wrap an existing registry. Collectors already in it cannot be adopted.
    pub fn from_registry(registry: Registry) -> Self {
        Self {
            inner: registry,
            adopted: Arc::default(),
        }
    }

    /// Underlying prometheus registry.
    #[inline]
    pub fn registry(&self) -> &Registry {
        &self.inner
    }

    /// Register a collector.
    ///
    /// A duplicate is reported as [`RegistryError::AlreadyRegistered`],
    /// distinct from any other registration failure.
    pub fn register<C>(&self, collector: C) -> Result<(), RegistryError>
    where
        C: Collector + Clone + 'static,
    {
        let key = collector_key(&collector);
        let mut adopted = self.lock();
        if adopted.contains_key(&key) {
            return Err(RegistryError::AlreadyRegistered { name: key });
        }

        match self.inner.register(Box::new(collector.clone())) {
            Ok(()) => {
                adopted.insert(key, Box::new(collector));
                Ok(())
            }
            Err(prometheus::Error::AlreadyReg) => Err(RegistryError::AlreadyRegistered { name: key }),
            Err(e) => Err(RegistryError::Prometheus(e)),
        }
    }

    /// Register a collector, or return the instance registered earlier under the same descriptors.
    ///
    /// The returned value is the collector that is actually exported; callers must use it
    /// instead of the argument.
    pub fn register_or_reuse<C>(&self, collector: C) -> Result<C, RegistryError>
    where
        C: Collector + Clone + 'static,
    {
        let key = collector_key(&collector);
        let mut adopted = self.lock();
        if let Some(existing) = adopted.get(&key) {
            debug!(collector = %key, "reusing already registered collector");
            return existing
                .downcast_ref::<C>()
                .cloned()
                .ok_or(RegistryError::Conflict { name: key });
        }

        match self.inner.register(Box::new(collector.clone())) {
            Ok(()) => {
                adopted.insert(key, Box::new(collector.clone()));
                Ok(collector)
            }
            Err(prometheus::Error::AlreadyReg) => Err(RegistryError::Foreign { name: key }),
            Err(e) => Err(RegistryError::Prometheus(e)),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Adopted> {
        self.adopted.lock().unwrap_or_else(|p| p.into_inner())
    }
}

impl Gatherer for SharedRegistry {
    fn gather(&self) -> Result<Vec<MetricFamily>, GatherError> {
        Ok(self.inner.gather())
    }
}

impl fmt::Debug for SharedRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SharedRegistry")
            .field("adopted", &self.lock().len())
            .finish()
    }
}

/// Sorted, comma-joined fully-qualified descriptor names.
fn collector_key(collector: &dyn Collector) -> String {
    let mut names: Vec<&str> = collector
        .desc()
        .into_iter()
        .map(|d| d.fq_name.as_str())
        .collect();
    names.sort_unstable();
    names.join(",")
}
