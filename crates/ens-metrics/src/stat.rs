use std::fmt::Write as _;

use ens_core::errors::{EnsembleError, ErrorInfo};
use serde::{Deserialize, Serialize};

/// Names of the values exposed by [`CentralTendencySummary`], in report order.
pub const CENTRAL_TENDENCY_METRICS: [&str; 8] = [
    "mean", "median", "mode", "stddev", "stderr", "min", "max", "range",
];

/// Central tendency and spread of a set of real values.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct CentralTendencySummary {
    /// Arithmetic mean.
    pub mean: f64,
    /// Middle value, or the mean of the two middle values for even counts.
    pub median: f64,
    /// Most frequent exact value; ties are averaged.
    pub mode: f64,
    /// Population standard deviation.
    pub stddev: f64,
    /// Standard error of the mean.
    pub stderr: f64,
    /// Smallest value.
    pub min: f64,
    /// Largest value.
    pub max: f64,
    /// `max - min`.
    pub range: f64,
}

impl CentralTendencySummary {
    /// Summarises the provided values. Fails on an empty slice.
    pub fn from_values(values: &[f64]) -> Result<Self, EnsembleError> {
        if values.is_empty() {
            return Err(EnsembleError::Data(
                ErrorInfo::new(
                    "stat.empty_ensemble",
                    "no values were collected; cannot summarise an empty ensemble",
                )
                .with_hint("check that the ensemble generating protocol produces successful items"),
            ));
        }
        let count = values.len() as f64;
        let mut sorted = values.to_vec();
        sorted.sort_by(f64::total_cmp);

        let mean = values.iter().sum::<f64>() / count;
        let mid = sorted.len() / 2;
        let median = if sorted.len() % 2 == 0 {
            (sorted[mid - 1] + sorted[mid]) / 2.0
        } else {
            sorted[mid]
        };
        let variance = values
            .iter()
            .map(|value| (value - mean).powi(2))
            .sum::<f64>()
            / count;
        let stddev = variance.sqrt();
        let min = sorted[0];
        let max = sorted[sorted.len() - 1];

        Ok(Self {
            mean,
            median,
            mode: mode_of_sorted(&sorted),
            stddev,
            stderr: stddev / count.sqrt(),
            min,
            max,
            range: max - min,
        })
    }

    /// Looks up a value by its report name.
    pub fn get(&self, name: &str) -> Option<f64> {
        match name {
            "mean" => Some(self.mean),
            "median" => Some(self.median),
            "mode" => Some(self.mode),
            "stddev" => Some(self.stddev),
            "stderr" => Some(self.stderr),
            "min" => Some(self.min),
            "max" => Some(self.max),
            "range" => Some(self.range),
            _ => None,
        }
    }

    /// Renders the report block for values produced by `measure`.
    pub fn render(&self, measure: &str) -> String {
        let mut out = String::new();
        let _ = write!(
            out,
            "Computed values for {measure} real-valued simple metric."
        );
        for name in CENTRAL_TENDENCY_METRICS {
            let value = self.get(name).unwrap_or_default();
            let _ = write!(out, "\n\t{name}:\t{value}");
        }
        out
    }
}

/// Mode over exact equality. When several values share the top count, the
/// mode is their average.
fn mode_of_sorted(sorted: &[f64]) -> f64 {
    let mut best_count = 0usize;
    let mut best_sum = 0.0;
    let mut best_ties = 0usize;
    let mut start = 0usize;
    while start < sorted.len() {
        let value = sorted[start];
        let mut end = start + 1;
        while end < sorted.len() && sorted[end] == value {
            end += 1;
        }
        let count = end - start;
        if count > best_count {
            best_count = count;
            best_sum = value;
            best_ties = 1;
        } else if count == best_count {
            best_sum += value;
            best_ties += 1;
        }
        start = end;
    }
    best_sum / best_ties as f64
}
