//! Creation of ensemble metrics by registry key.

use std::collections::BTreeMap;
use std::fmt;

use ens_core::errors::{EnsembleError, ErrorInfo};
use ens_core::Item;
use tracing::info;

use crate::central_tendency::{CentralTendency, CENTRAL_TENDENCY};
use crate::config::MetricTag;
use crate::kind::EnsembleKind;
use crate::metric::EnsembleMetric;
use crate::resources::{Resources, SharedMetric};

/// Builds a fresh, unconfigured kind.
pub type KindFactory<P> = Box<dyn Fn() -> Box<dyn EnsembleKind<P>> + Send + Sync>;

/// Registry of metric kinds keyed by name.
///
/// Built once at start-up and passed to whatever needs to create metrics.
pub struct MetricRegistry<P: Item> {
    factories: BTreeMap<String, KindFactory<P>>,
}

impl<P: Item> Default for MetricRegistry<P> {
    fn default() -> Self {
        Self {
            factories: BTreeMap::new(),
        }
    }
}

impl<P: Item> fmt::Debug for MetricRegistry<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MetricRegistry")
            .field("keys", &self.keys())
            .finish()
    }
}

impl<P: Item> MetricRegistry<P> {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a registry holding every kind shipped with this crate.
    pub fn with_builtin_kinds() -> Self {
        let mut registry = Self::new();
        registry.factories.insert(
            CENTRAL_TENDENCY.to_string(),
            Box::new(|| -> Box<dyn EnsembleKind<P>> { Box::new(CentralTendency::<P>::new()) }),
        );
        registry
    }

    /// Registers a factory under `key`. Keys are unique.
    pub fn register<F>(&mut self, key: impl Into<String>, factory: F) -> Result<(), EnsembleError>
    where
        F: Fn() -> Box<dyn EnsembleKind<P>> + Send + Sync + 'static,
    {
        let key = key.into();
        if self.factories.contains_key(&key) {
            return Err(EnsembleError::Config(
                ErrorInfo::new(
                    "registry.duplicate_key",
                    format!("an ensemble metric kind named \"{key}\" is already registered"),
                )
                .with_context("key", key),
            ));
        }
        self.factories.insert(key, Box::new(factory));
        Ok(())
    }

    /// Whether a kind is registered under `key`.
    pub fn has(&self, key: &str) -> bool {
        self.factories.contains_key(key)
    }

    /// Registered keys in sorted order.
    pub fn keys(&self) -> Vec<&str> {
        self.factories.keys().map(String::as_str).collect()
    }

    fn instantiate(&self, key: &str) -> Result<Box<dyn EnsembleKind<P>>, EnsembleError> {
        let factory = self.factories.get(key).ok_or_else(|| {
            EnsembleError::NotFound(
                ErrorInfo::new(
                    "registry.unregistered_key",
                    format!("no ensemble metric kind is registered as \"{key}\""),
                )
                .with_context("key", key)
                .with_hint(format!("registered kinds: {}", self.keys().join(", "))),
            )
        })?;
        Ok(factory())
    }

    /// Builds and configures a metric of kind `key`.
    ///
    /// Common options are applied first, then the kind's own options. The
    /// kind's citations are appended to `resources`.
    pub fn create(
        &self,
        key: &str,
        tag: &MetricTag,
        resources: &mut Resources<P>,
    ) -> Result<EnsembleMetric<P>, EnsembleError> {
        let mut metric = EnsembleMetric::new(self.instantiate(key)?);
        metric.configure_common(tag, resources)?;
        metric.kind_mut().configure(tag, resources)?;
        resources.add_citations(metric.kind().citations());
        Ok(metric)
    }

    /// Human readable author information for kind `key`; empty when the kind cites nobody.
    pub fn citation_text(&self, key: &str) -> Result<String, EnsembleError> {
        let citations = self.instantiate(key)?.citations();
        if citations.is_empty() {
            return Ok(String::new());
        }
        Ok(format!(
            "References and author information for the {key} ensemble metric:\n\n{}",
            citations.to_human_readable()
        ))
    }
}

/// Builds every configured metric and stores it in `resources`.
///
/// Each metric is stored under its tag's name, defaulting to the kind key.
pub fn load_metrics<P: Item>(
    tags: &[MetricTag],
    registry: &MetricRegistry<P>,
    resources: &mut Resources<P>,
) -> Result<Vec<SharedMetric<P>>, EnsembleError> {
    let mut loaded = Vec::with_capacity(tags.len());
    for tag in tags {
        let metric = registry.create(&tag.kind, tag, resources)?;
        let label = metric.label();
        let shared = resources.add_metric(tag.storage_name(), metric)?;
        info!(kind = %tag.kind, name = tag.storage_name(), label = %label, "loaded ensemble metric");
        loaded.push(shared);
    }
    Ok(loaded)
}
