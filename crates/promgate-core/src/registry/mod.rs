//! Gatherer collaborators.
//!
//! A [`Gatherer`] snapshots the current measurement state. Failures may still
//! carry the families that were collected successfully (see [`GatherError`]).
mod shared;
pub use shared::SharedRegistry;

use std::{
    collections::{BTreeMap, HashSet},
    fmt,
    sync::Arc,
};

use prometheus::{
    Registry,
    proto::{Metric, MetricFamily},
};

/// Source of metric families for one scrape.
pub trait Gatherer: Send + Sync + 'static {
    /// Collect all families. On error, partial results travel inside [`GatherError`].
    fn gather(&self) -> Result<Vec<MetricFamily>, GatherError>;
}

impl Gatherer for Registry {
    fn gather(&self) -> Result<Vec<MetricFamily>, GatherError> {
        Ok(Registry::gather(self))
    }
}

impl<G: Gatherer + ?Sized> Gatherer for Arc<G> {
    fn gather(&self) -> Result<Vec<MetricFamily>, GatherError> {
        (**self).gather()
    }
}

/// Closure adapter for [`Gatherer`].
pub struct GatherFn<F>(pub F)
where
    F: Fn() -> Result<Vec<MetricFamily>, GatherError>;

impl<F> Gatherer for GatherFn<F>
where
    F: Fn() -> Result<Vec<MetricFamily>, GatherError> + Send + Sync + 'static,
{
    fn gather(&self) -> Result<Vec<MetricFamily>, GatherError> {
        (self.0)()
    }
}

/// One or more gather failures plus whatever was collected anyway.
#[derive(Debug, Clone, Default)]
pub struct GatherError {
    partial: Vec<MetricFamily>,
    errors: Vec<String>,
}

impl GatherError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            partial: Vec::new(),
            errors: vec![message.into()],
        }
    }

    /// Attach the families gathered despite the failure.
    pub fn with_partial(mut self, families: Vec<MetricFamily>) -> Self {
        self.partial = families;
        self
    }

    pub fn push(&mut self, message: impl Into<String>) {
        self.errors.push(message.into());
    }

    #[inline]
    pub fn partial(&self) -> &[MetricFamily] {
        &self.partial
    }

    #[inline]
    pub fn messages(&self) -> &[String] {
        &self.errors
    }

    pub fn into_partial(self) -> Vec<MetricFamily> {
        self.partial
    }
}

impl fmt::Display for GatherError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.errors.as_slice() {
            [] => f.write_str("gathering failed"),
            [one] => f.write_str(one),
            many => {
                write!(f, "{} errors occurred:", many.len())?;
                for e in many {
                    write!(f, "\n* {e}")?;
                }
                Ok(())
            }
        }
    }
}

impl std::error::Error for GatherError {}

/// Union of several gatherers.
///
/// Families are returned sorted by name. Families with the same name from several
/// members are merged into one. A family whose help or type differs from the one
/// gathered first is dropped and reported. A metric whose label values were already
/// collected under the same name is dropped and reported too. Member errors are
/// collected; the merged partial result is always returned.
#[derive(Default, Clone)]
pub struct Gatherers {
    members: Vec<Arc<dyn Gatherer>>,
}

impl Gatherers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, gatherer: impl Gatherer) -> Self {
        self.members.push(Arc::new(gatherer));
        self
    }

    pub fn push(&mut self, gatherer: Arc<dyn Gatherer>) {
        self.members.push(gatherer);
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.members.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}

impl Gatherer for Gatherers {
    fn gather(&self) -> Result<Vec<MetricFamily>, GatherError> {
        let mut merged: BTreeMap<String, MetricFamily> = BTreeMap::new();
        let mut seen: HashSet<(String, String)> = HashSet::new();
        let mut errors = Vec::new();

        for member in &self.members {
            let families = match member.gather() {
                Ok(families) => families,
                Err(err) => {
                    errors.extend(err.errors.iter().cloned());
                    err.into_partial()
                }
            };

            for mut mf in families {
                let name = mf.name().to_string();
                if let Some(existing) = merged.get(&name) {
                    if existing.help() != mf.help() || existing.type_() != mf.type_() {
                        errors.push(format!(
                            "metric family {name:?} has help or type inconsistent with a previously gathered family"
                        ));
                        continue;
                    }
                }

                let metrics = std::mem::take(&mut mf.metric);
                let family = merged.entry(name.clone()).or_insert(mf);
                for metric in metrics {
                    let labels = label_signature(&metric);
                    if seen.insert((name.clone(), labels.clone())) {
                        family.metric.push(metric);
                    } else {
                        errors.push(format!(
                            "metric {name}{labels} was collected before with the same name and label values"
                        ));
                    }
                }
            }
        }

        let families: Vec<MetricFamily> = merged
            .into_values()
            .map(|mut mf| {
                mf.metric.sort_by_cached_key(label_signature);
                mf
            })
            .collect();

        if errors.is_empty() {
            Ok(families)
        } else {
            Err(GatherError {
                partial: families,
                errors,
            })
        }
    }
}

/// `{a="1",b="2"}` with label names sorted; empty for unlabelled metrics.
fn label_signature(metric: &Metric) -> String {
    let mut pairs: Vec<(&str, &str)> = metric.label.iter().map(|l| (l.name(), l.value())).collect();
    if pairs.is_empty() {
        return String::new();
    }
    pairs.sort_unstable();

    let body: Vec<String> = pairs.iter().map(|(k, v)| format!("{k}={v:?}")).collect();
    format!("{{{}}}", body.join(","))
}
