#![doc = "Ensemble metrics: accumulate measurements over a batch of items and report their summary once."]

/// Central tendency kind.
pub mod central_tendency;
/// Metric tags and script configuration.
pub mod config;
/// Parallel ensemble generation.
pub mod dispatch;
/// Threshold gates over finalized metrics.
pub mod filters;
/// The kind trait implemented by concrete statistics engines.
pub mod kind;
/// Accumulation engine and its state machine.
pub mod metric;
/// Report sink selection.
pub mod output;
/// Factory registry and metric loader.
pub mod registry;
/// Report rendering and file output.
pub mod report;
/// Named measures, generators and metrics.
pub mod resources;
/// Canonical JSON and YAML serde helpers.
pub mod serde;
/// Summary statistics.
pub mod stat;
/// Distributed collection of raw measurements.
pub mod transport;

pub use central_tendency::{CentralTendency, CENTRAL_TENDENCY};
pub use config::{load_script_config, MetricTag, ScriptConfig};
pub use dispatch::{BatchOutcome, ParallelEnsembleGenerator};
pub use filters::{AcceptanceMode, GateDecision, GateSpec, ThresholdGate};
pub use kind::EnsembleKind;
pub use metric::{EnsembleMetric, MetricSettings};
pub use output::OutputMode;
pub use registry::{load_metrics, KindFactory, MetricRegistry};
pub use report::REPORT_TARGET;
pub use resources::{Resources, SharedMetric};
pub use stat::{CentralTendencySummary, CENTRAL_TENDENCY_METRICS};
pub use transport::{ChannelTransport, SummaryPacket, SummaryTransport};
