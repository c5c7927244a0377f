#![allow(dead_code)]

use std::collections::{BTreeSet, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use ens_core::{EnsembleGenerator, Measure, MoveStatus};
use ens_metrics::{CentralTendency, EnsembleMetric};

/// Minimal stand-in for a pose: a one-letter amino acid sequence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Peptide {
    pub sequence: String,
}

impl Peptide {
    pub fn new(sequence: &str) -> Self {
        Self {
            sequence: sequence.to_string(),
        }
    }

    /// A sequence holding exactly `valines` valine residues.
    pub fn with_valines(valines: usize) -> Self {
        Self::new(&format!("A{}G", "V".repeat(valines)))
    }
}

/// Counts valine residues.
pub struct ValineCount;

impl Measure<Peptide> for ValineCount {
    fn name(&self) -> &str {
        "valine_count"
    }

    fn calculate(&self, item: &Peptide) -> f64 {
        item.sequence.chars().filter(|residue| *residue == 'V').count() as f64
    }
}

/// Reads a plain number.
pub struct Identity;

impl Measure<f64> for Identity {
    fn name(&self) -> &str {
        "identity"
    }

    fn calculate(&self, item: &f64) -> f64 {
        *item
    }
}

/// Hands out sequences from a shared list, one per call across all clones.
/// Draws listed in `failing` (0-based) fail, as do draws past the end.
#[derive(Clone)]
pub struct SequenceDraw {
    sequences: Arc<Vec<String>>,
    failing: Arc<BTreeSet<usize>>,
    next: Arc<AtomicUsize>,
}

impl SequenceDraw {
    pub fn new(sequences: &[&str]) -> Self {
        Self {
            sequences: Arc::new(sequences.iter().map(|s| s.to_string()).collect()),
            failing: Arc::new(BTreeSet::new()),
            next: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn failing(mut self, draws: &[usize]) -> Self {
        self.failing = Arc::new(draws.iter().copied().collect());
        self
    }

    pub fn draws(&self) -> usize {
        self.next.load(Ordering::SeqCst)
    }
}

impl EnsembleGenerator<Peptide> for SequenceDraw {
    fn name(&self) -> &str {
        "sequence_draw"
    }

    fn clone_boxed(&self) -> Box<dyn EnsembleGenerator<Peptide>> {
        Box::new(self.clone())
    }

    fn apply(&mut self, item: &mut Peptide) -> MoveStatus {
        let draw = self.next.fetch_add(1, Ordering::SeqCst);
        if self.failing.contains(&draw) {
            return MoveStatus::Failure;
        }
        match self.sequences.get(draw) {
            Some(sequence) => {
                item.sequence = sequence.clone();
                MoveStatus::Success
            }
            None => MoveStatus::Failure,
        }
    }
}

/// Upstream step that produced several outputs; every clone replays all extras.
#[derive(Clone)]
pub struct MultiOutput {
    extras: VecDeque<Peptide>,
    clones: Arc<Mutex<usize>>,
}

impl MultiOutput {
    pub fn new(extras: &[&str]) -> Self {
        Self {
            extras: extras.iter().map(|s| Peptide::new(s)).collect(),
            clones: Arc::new(Mutex::new(0)),
        }
    }

    pub fn clone_count(&self) -> usize {
        *self.clones.lock().expect("clone counter")
    }
}

impl EnsembleGenerator<Peptide> for MultiOutput {
    fn name(&self) -> &str {
        "multi_output"
    }

    fn clone_boxed(&self) -> Box<dyn EnsembleGenerator<Peptide>> {
        *self.clones.lock().expect("clone counter") += 1;
        Box::new(self.clone())
    }

    fn apply(&mut self, _item: &mut Peptide) -> MoveStatus {
        MoveStatus::Success
    }

    fn additional_output(&mut self) -> Option<Peptide> {
        self.extras.pop_front()
    }
}

/// Central tendency metric over valine counts.
pub fn valine_metric() -> EnsembleMetric<Peptide> {
    EnsembleMetric::new(Box::new(CentralTendency::<Peptide>::with_measure(
        Arc::new(ValineCount),
    )))
}

/// Central tendency metric over plain numbers.
pub fn number_metric() -> EnsembleMetric<f64> {
    EnsembleMetric::new(Box::new(CentralTendency::<f64>::with_measure(
        Arc::new(Identity),
    )))
}

/// Absorbs the values and reports.
pub fn finalized_number_metric(values: &[f64]) -> EnsembleMetric<f64> {
    let mut metric = number_metric();
    for value in values {
        metric.apply(value).expect("apply");
    }
    metric.report().expect("report");
    metric
}

pub fn assert_close(actual: f64, expected: f64) {
    assert!(
        (actual - expected).abs() < 1e-6,
        "expected {expected}, got {actual}"
    );
}
