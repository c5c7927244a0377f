use std::fmt;
use std::io::Write;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use ens_core::errors::{EnsembleError, ErrorInfo};
use ens_core::{Citation, CitationList, CitedModuleType, Item};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::metric::EnsembleMetric;
use crate::resources::{Resources, SharedMetric};

/// Comparison applied between a metric value and the threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AcceptanceMode {
    /// Accept when `value > threshold`.
    GreaterThan,
    /// Accept when `value < threshold`.
    LessThan,
    /// Accept when `value >= threshold`.
    GreaterThanOrEqual,
    /// Accept when `value <= threshold`.
    #[default]
    LessThanOrEqual,
    /// Accept when `value == threshold`.
    Equal,
    /// Accept when `value != threshold`.
    NotEqual,
}

impl AcceptanceMode {
    /// Every mode, in declaration order.
    pub const ALL: [AcceptanceMode; 6] = [
        AcceptanceMode::GreaterThan,
        AcceptanceMode::LessThan,
        AcceptanceMode::GreaterThanOrEqual,
        AcceptanceMode::LessThanOrEqual,
        AcceptanceMode::Equal,
        AcceptanceMode::NotEqual,
    ];

    /// Configuration name of the mode.
    pub fn name(self) -> &'static str {
        match self {
            AcceptanceMode::GreaterThan => "greater_than",
            AcceptanceMode::LessThan => "less_than",
            AcceptanceMode::GreaterThanOrEqual => "greater_than_or_equal",
            AcceptanceMode::LessThanOrEqual => "less_than_or_equal",
            AcceptanceMode::Equal => "equal",
            AcceptanceMode::NotEqual => "not_equal",
        }
    }

    /// Parses a configuration name.
    pub fn from_name(name: &str) -> Result<Self, EnsembleError> {
        Self::ALL
            .into_iter()
            .find(|mode| mode.name() == name)
            .ok_or_else(|| {
                let allowed: Vec<&str> = Self::ALL.iter().map(|mode| mode.name()).collect();
                EnsembleError::Config(
                    ErrorInfo::new(
                        "gate.unknown_acceptance_mode",
                        format!("\"{name}\" is not a valid filter_acceptance_mode"),
                    )
                    .with_context("mode", name)
                    .with_hint(format!("allowed modes: {}", allowed.join(", "))),
                )
            })
    }

    /// Whether `value` passes against `threshold`.
    pub fn accepts(self, value: f64, threshold: f64) -> bool {
        match self {
            AcceptanceMode::GreaterThan => value > threshold,
            AcceptanceMode::LessThan => value < threshold,
            AcceptanceMode::GreaterThanOrEqual => value >= threshold,
            AcceptanceMode::LessThanOrEqual => value <= threshold,
            AcceptanceMode::Equal => value == threshold,
            AcceptanceMode::NotEqual => value != threshold,
        }
    }
}

impl fmt::Display for AcceptanceMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Gate configuration as read from a script.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GateSpec {
    /// Name of a previously loaded ensemble metric.
    pub ensemble_metric: String,
    /// Value of that metric to compare.
    pub named_value: String,
    /// Threshold the value is compared against.
    #[serde(default)]
    pub threshold: f64,
    /// Comparison to apply.
    #[serde(default)]
    pub filter_acceptance_mode: AcceptanceMode,
}

/// Result of a gate evaluation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GateDecision {
    /// Kind of the metric that was read.
    pub kind: String,
    /// Name of the value that was read.
    pub named_value: String,
    /// Value read from the metric.
    pub value: f64,
    /// Threshold compared against.
    pub threshold: f64,
    /// Comparison applied.
    pub mode: AcceptanceMode,
    /// Whether the item is accepted.
    pub passes: bool,
}

/// Accepts or rejects items based on one value of a finalized ensemble metric.
///
/// The gate holds a weak handle: it never keeps a metric alive.
pub struct ThresholdGate<P: Item> {
    metric: Option<Weak<Mutex<EnsembleMetric<P>>>>,
    named_value: String,
    threshold: f64,
    mode: AcceptanceMode,
}

impl<P: Item> Default for ThresholdGate<P> {
    fn default() -> Self {
        Self {
            metric: None,
            named_value: String::new(),
            threshold: 0.0,
            mode: AcceptanceMode::default(),
        }
    }
}

impl<P: Item> fmt::Debug for ThresholdGate<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ThresholdGate")
            .field("has_metric", &self.metric.is_some())
            .field("named_value", &self.named_value)
            .field("threshold", &self.threshold)
            .field("mode", &self.mode)
            .finish()
    }
}

impl<P: Item> ThresholdGate<P> {
    /// Creates an unconfigured gate.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a gate from its configuration, resolving the metric in `resources`.
    pub fn from_spec(spec: &GateSpec, resources: &Resources<P>) -> Result<Self, EnsembleError> {
        let metric = resources.metric(&spec.ensemble_metric)?;
        let gate = {
            let guard = lock(&metric);
            if !guard.metric_names().contains(&spec.named_value.as_str()) {
                return Err(unknown_value(guard.kind_name(), &spec.named_value));
            }
            Self {
                metric: Some(Arc::downgrade(&metric)),
                named_value: spec.named_value.clone(),
                threshold: spec.threshold,
                mode: spec.filter_acceptance_mode,
            }
        };
        info!(
            metric = %spec.ensemble_metric,
            named_value = %spec.named_value,
            threshold = spec.threshold,
            mode = %spec.filter_acceptance_mode,
            "configured threshold gate"
        );
        Ok(gate)
    }

    /// Points the gate at a metric.
    pub fn set_metric(&mut self, metric: &SharedMetric<P>) {
        self.metric = Some(Arc::downgrade(metric));
    }

    /// Selects the value to read.
    pub fn set_named_value(&mut self, named_value: impl Into<String>) {
        self.named_value = named_value.into();
    }

    /// Sets the threshold.
    pub fn set_threshold(&mut self, threshold: f64) {
        self.threshold = threshold;
    }

    /// Sets the comparison.
    pub fn set_acceptance_mode(&mut self, mode: AcceptanceMode) {
        self.mode = mode;
    }

    /// Name of the value read.
    pub fn named_value(&self) -> &str {
        &self.named_value
    }

    /// Threshold compared against.
    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    /// Comparison applied.
    pub fn acceptance_mode(&self) -> AcceptanceMode {
        self.mode
    }

    /// Reads the configured value, reporting the metric first if it has not reported yet.
    fn read(&self) -> Result<(String, f64), EnsembleError> {
        let metric = self
            .metric
            .as_ref()
            .and_then(Weak::upgrade)
            .ok_or_else(|| {
                EnsembleError::Precondition(
                    ErrorInfo::new(
                        "gate.no_metric",
                        "the gate has no live ensemble metric to read from",
                    )
                    .with_hint("set ensemble_metric to a loaded metric"),
                )
            })?;
        if self.named_value.is_empty() {
            return Err(EnsembleError::Config(ErrorInfo::new(
                "gate.no_named_value",
                "a named value must be provided to read from the ensemble metric",
            )));
        }
        let mut guard = lock(&metric);
        if !guard.metric_names().contains(&self.named_value.as_str()) {
            return Err(unknown_value(guard.kind_name(), &self.named_value));
        }
        if !guard.finalized() {
            guard.report()?;
        }
        let value = guard.get_value(&self.named_value)?;
        Ok((guard.kind_name().to_string(), value))
    }

    /// Evaluates the gate and returns the full decision.
    pub fn decide(&self, _item: &P) -> Result<GateDecision, EnsembleError> {
        let (kind, value) = self.read()?;
        let passes = self.mode.accepts(value, self.threshold);
        info!(
            kind = %kind,
            named_value = %self.named_value,
            value,
            threshold = self.threshold,
            mode = %self.mode,
            passes,
            "threshold gate evaluated"
        );
        Ok(GateDecision {
            kind,
            named_value: self.named_value.clone(),
            value,
            threshold: self.threshold,
            mode: self.mode,
            passes,
        })
    }

    /// True when the item is accepted.
    pub fn evaluate(&self, item: &P) -> Result<bool, EnsembleError> {
        Ok(self.decide(item)?.passes)
    }

    /// The value the gate compares.
    pub fn report_value(&self, _item: &P) -> Result<f64, EnsembleError> {
        Ok(self.read()?.1)
    }

    /// Writes a one-line verdict for the item.
    pub fn report(&self, item: &P, out: &mut dyn Write) -> Result<(), EnsembleError> {
        let decision = self.decide(item)?;
        writeln!(
            out,
            "EnsembleMetric {} reports {} = {}.  This {} this filter.",
            decision.kind,
            decision.named_value,
            decision.value,
            if decision.passes { "PASSES" } else { "FAILS" }
        )
        .map_err(|err| EnsembleError::Io(ErrorInfo::new("gate.report_write", err.to_string())))
    }

    /// Authorship records for the gate.
    pub fn citations(&self) -> CitationList {
        let mut list = CitationList::new();
        list.add(Citation {
            module: "EnsembleMetricThresholdGate".into(),
            module_type: CitedModuleType::Filter,
            authors: "ENS Contributors".into(),
            affiliation: String::new(),
            email: String::new(),
            note: "Accepts or rejects items by comparing an ensemble metric value to a threshold."
                .into(),
        });
        list
    }
}

fn lock<P: Item>(metric: &SharedMetric<P>) -> MutexGuard<'_, EnsembleMetric<P>> {
    metric.lock().unwrap_or_else(PoisonError::into_inner)
}

fn unknown_value(kind: &str, named_value: &str) -> EnsembleError {
    EnsembleError::NotFound(
        ErrorInfo::new(
            "gate.unknown_value",
            format!("the {kind} ensemble metric does not compute a value named \"{named_value}\""),
        )
        .with_context("kind", kind)
        .with_context("named_value", named_value),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::serde::from_yaml_slice;

    #[test]
    fn acceptance_modes_round_trip_by_name() {
        for mode in AcceptanceMode::ALL {
            assert_eq!(AcceptanceMode::from_name(mode.name()).expect("known"), mode);
        }
        let err = AcceptanceMode::from_name("roughly").expect_err("unknown");
        assert_eq!(err.code(), "gate.unknown_acceptance_mode");
    }

    #[test]
    fn spec_defaults() {
        let spec: GateSpec =
            from_yaml_slice(b"ensemble_metric: ct\nnamed_value: mean\n").expect("parse");
        assert_eq!(spec.threshold, 0.0);
        assert_eq!(spec.filter_acceptance_mode, AcceptanceMode::LessThanOrEqual);
    }

    #[test]
    fn unconfigured_gate_is_rejected() {
        let gate: ThresholdGate<f64> = ThresholdGate::new();
        let err = gate.evaluate(&0.0).expect_err("no metric");
        assert_eq!(err.code(), "gate.no_metric");
    }
}
