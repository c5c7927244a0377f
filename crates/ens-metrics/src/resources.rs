use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use ens_core::errors::{EnsembleError, ErrorInfo};
use ens_core::{CitationList, EnsembleGenerator, Item, Measure};

use crate::metric::EnsembleMetric;

/// Metric handle shared between the workflow that feeds it and the gates reading it.
pub type SharedMetric<P> = Arc<Mutex<EnsembleMetric<P>>>;

fn duplicate(category: &str, name: &str) -> EnsembleError {
    EnsembleError::Config(
        ErrorInfo::new(
            "resources.duplicate_name",
            format!("{category} \"{name}\" already exists; please rename"),
        )
        .with_context("category", category)
        .with_context("name", name),
    )
}

fn missing(category: &str, name: &str) -> EnsembleError {
    EnsembleError::NotFound(
        ErrorInfo::new(
            "resources.missing",
            format!("no {category} named \"{name}\" has been defined"),
        )
        .with_context("category", category)
        .with_context("name", name),
    )
}

/// Named objects available while configuring metrics and gates.
pub struct Resources<P: Item> {
    measures: BTreeMap<String, Arc<dyn Measure<P>>>,
    generators: BTreeMap<String, Arc<dyn EnsembleGenerator<P>>>,
    metrics: BTreeMap<String, SharedMetric<P>>,
    citations: CitationList,
}

impl<P: Item> Default for Resources<P> {
    fn default() -> Self {
        Self {
            measures: BTreeMap::new(),
            generators: BTreeMap::new(),
            metrics: BTreeMap::new(),
            citations: CitationList::new(),
        }
    }
}

impl<P: Item> Resources<P> {
    /// Creates an empty resource map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a named measure.
    pub fn add_measure(
        &mut self,
        name: impl Into<String>,
        measure: Arc<dyn Measure<P>>,
    ) -> Result<(), EnsembleError> {
        let name = name.into();
        if self.measures.contains_key(&name) {
            return Err(duplicate("measure", &name));
        }
        self.measures.insert(name, measure);
        Ok(())
    }

    /// Looks up a measure by name.
    pub fn measure(&self, name: &str) -> Result<Arc<dyn Measure<P>>, EnsembleError> {
        self.measures
            .get(name)
            .cloned()
            .ok_or_else(|| missing("measure", name))
    }

    /// Registers a named ensemble-generating protocol.
    pub fn add_generator(
        &mut self,
        name: impl Into<String>,
        generator: Arc<dyn EnsembleGenerator<P>>,
    ) -> Result<(), EnsembleError> {
        let name = name.into();
        if self.generators.contains_key(&name) {
            return Err(duplicate("generator", &name));
        }
        self.generators.insert(name, generator);
        Ok(())
    }

    /// Looks up a generator by name.
    pub fn generator(&self, name: &str) -> Result<Arc<dyn EnsembleGenerator<P>>, EnsembleError> {
        self.generators
            .get(name)
            .cloned()
            .ok_or_else(|| missing("generator", name))
    }

    /// Stores a built metric and returns the shared handle.
    pub fn add_metric(
        &mut self,
        name: impl Into<String>,
        metric: EnsembleMetric<P>,
    ) -> Result<SharedMetric<P>, EnsembleError> {
        let name = name.into();
        if self.metrics.contains_key(&name) {
            return Err(duplicate("ensemble metric", &name));
        }
        let shared = Arc::new(Mutex::new(metric));
        self.metrics.insert(name, Arc::clone(&shared));
        Ok(shared)
    }

    /// Looks up a stored metric by name.
    pub fn metric(&self, name: &str) -> Result<SharedMetric<P>, EnsembleError> {
        self.metrics
            .get(name)
            .cloned()
            .ok_or_else(|| missing("ensemble metric", name))
    }

    /// Names of every stored metric, sorted.
    pub fn metric_names(&self) -> Vec<&str> {
        self.metrics.keys().map(String::as_str).collect()
    }

    /// Appends citations collected while building metrics.
    pub fn add_citations(&mut self, citations: CitationList) {
        self.citations.extend(citations);
    }

    /// Citations collected so far.
    pub fn citations(&self) -> &CitationList {
        &self.citations
    }
}
