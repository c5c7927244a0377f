//! Central tendency kind: mean, median, mode and spread of one real-valued measure.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use ens_core::errors::{EnsembleError, ErrorInfo};
use ens_core::{Citation, CitationList, CitedModuleType, Item, Measure};
use tracing::{debug, info};

use crate::config::MetricTag;
use crate::kind::EnsembleKind;
use crate::resources::Resources;
use crate::stat::{CentralTendencySummary, CENTRAL_TENDENCY_METRICS};
use crate::transport::SummaryPacket;

/// Registry key of the central tendency kind.
pub const CENTRAL_TENDENCY: &str = "CentralTendency";

/// Collects one value per item from a [`Measure`] and summarises them.
pub struct CentralTendency<P> {
    measure: Option<Arc<dyn Measure<P>>>,
    values: Vec<f64>,
    summary: CentralTendencySummary,
    finalized: bool,
}

impl<P> Default for CentralTendency<P> {
    fn default() -> Self {
        Self {
            measure: None,
            values: Vec::new(),
            summary: CentralTendencySummary::default(),
            finalized: false,
        }
    }
}

impl<P> fmt::Debug for CentralTendency<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CentralTendency")
            .field("measure", &self.measure_name())
            .field("values", &self.values.len())
            .field("finalized", &self.finalized)
            .finish()
    }
}

impl<P> CentralTendency<P> {
    /// Creates a kind with no measure configured.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a kind reading the given measure.
    pub fn with_measure(measure: Arc<dyn Measure<P>>) -> Self {
        Self {
            measure: Some(measure),
            ..Self::default()
        }
    }

    /// Replaces the measure.
    pub fn set_measure(&mut self, measure: Arc<dyn Measure<P>>) {
        self.measure = Some(measure);
    }

    /// Name of the configured measure, if any.
    pub fn measure_name(&self) -> Option<&str> {
        self.measure.as_deref().map(|measure| measure.name())
    }

    /// Raw values in absorption order.
    pub fn values(&self) -> &[f64] {
        &self.values
    }

    /// Derived statistics; `None` until finalized.
    pub fn summary(&self) -> Option<&CentralTendencySummary> {
        self.finalized.then_some(&self.summary)
    }
}

impl<P: Item> EnsembleKind<P> for CentralTendency<P> {
    fn name(&self) -> &str {
        CENTRAL_TENDENCY
    }

    fn metric_names(&self) -> &'static [&'static str] {
        &CENTRAL_TENDENCY_METRICS
    }

    fn configure(
        &mut self,
        tag: &MetricTag,
        resources: &Resources<P>,
    ) -> Result<(), EnsembleError> {
        let measure_name: String = tag.required("real_valued_metric")?;
        self.measure = Some(resources.measure(&measure_name)?);
        info!(kind = CENTRAL_TENDENCY, measure = %measure_name, "configured measure");
        Ok(())
    }

    fn absorb(&mut self, item: &P, ordinal: usize) -> Result<(), EnsembleError> {
        let measure = self.measure.as_ref().ok_or_else(|| {
            EnsembleError::Precondition(
                ErrorInfo::new(
                    "central_tendency.no_measure",
                    "a real-valued measure must be configured before items are absorbed",
                )
                .with_context("kind", CENTRAL_TENDENCY)
                .with_hint("set the real_valued_metric option"),
            )
        })?;
        let value = measure.calculate(item);
        debug!(
            kind = CENTRAL_TENDENCY,
            measure = measure.name(),
            ordinal,
            value,
            "absorbed item"
        );
        self.values.push(value);
        Ok(())
    }

    fn finalize_and_render(&mut self) -> Result<String, EnsembleError> {
        if !self.finalized {
            self.summary = CentralTendencySummary::from_values(&self.values).map_err(|err| {
                let mut info = err.info().clone();
                info.context.insert("kind".into(), CENTRAL_TENDENCY.into());
                EnsembleError::Data(info)
            })?;
            self.finalized = true;
        }
        Ok(self.summary.render(self.measure_name().unwrap_or("unnamed")))
    }

    fn value(&self, metric_name: &str) -> Result<f64, EnsembleError> {
        self.summary.get(metric_name).ok_or_else(|| {
            EnsembleError::NotFound(
                ErrorInfo::new("central_tendency.unknown_value", "no value with this name")
                    .with_context("kind", CENTRAL_TENDENCY)
                    .with_context("name", metric_name),
            )
        })
    }

    fn clear(&mut self) {
        self.values.clear();
        self.summary = CentralTendencySummary::default();
        self.finalized = false;
    }

    fn citations(&self) -> CitationList {
        let mut list = CitationList::new();
        list.add(Citation {
            module: CENTRAL_TENDENCY.into(),
            module_type: CitedModuleType::EnsembleMetric,
            authors: "ENS Contributors".into(),
            affiliation: String::new(),
            email: String::new(),
            note: "Mean, median, mode and spread of a real-valued measure over an ensemble."
                .into(),
        });
        list
    }

    fn supports_distributed_collection(&self) -> bool {
        true
    }

    fn summary_packet(&self) -> Result<SummaryPacket, EnsembleError> {
        Ok(SummaryPacket {
            count: self.values.len(),
            values: self.values.clone(),
        })
    }

    fn absorb_packet(&mut self, packet: SummaryPacket) -> Result<(), EnsembleError> {
        packet.validate()?;
        self.values.extend(packet.values);
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
