//! The accumulation engine shared by every ensemble metric kind.
//!
//! An [`EnsembleMetric`] moves through two states. While collecting it
//! absorbs items through [`EnsembleMetric::apply`]; a successful
//! [`EnsembleMetric::report`] finalizes it, after which only reads are
//! allowed until [`EnsembleMetric::reset`] returns it to collecting.
//! Configuration survives resets.

use std::fmt;
use std::sync::Arc;

use ens_core::errors::{EnsembleError, ErrorInfo};
use ens_core::{EnsembleGenerator, Item, JobContext, NoJob};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use crate::config::MetricTag;
use crate::dispatch::ParallelEnsembleGenerator;
use crate::kind::{unsupported, EnsembleKind};
use crate::output::OutputMode;
use crate::report::{emit_to_tracer, render_report, report_file_path, write_report_file};
use crate::resources::Resources;
use crate::transport::SummaryTransport;

const VALID_MODES_HINT: &str = "valid modes are tracer, tracer_and_file and file";

/// Settings common to every metric kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricSettings {
    /// Prepended to the label and the report file name.
    pub label_prefix: String,
    /// Appended to the label and the report file name.
    pub label_suffix: String,
    /// Report sinks.
    pub output_mode: OutputMode,
    /// Report file; required by the file modes.
    pub output_filename: String,
    /// Maximum number of items generated per `apply` when a protocol is set.
    pub ensemble_generating_protocol_repeats: usize,
    /// Worker cap for generation; 0 uses every available core.
    pub n_workers: usize,
    /// Absorb every extra item the previous producer yields.
    pub use_additional_output_from_last_producer: bool,
}

impl Default for MetricSettings {
    fn default() -> Self {
        Self {
            label_prefix: String::new(),
            label_suffix: String::new(),
            output_mode: OutputMode::Tracer,
            output_filename: String::new(),
            ensemble_generating_protocol_repeats: 1,
            n_workers: 1,
            use_additional_output_from_last_producer: false,
        }
    }
}

/// Accumulates items into a kind and reports its summary exactly once.
pub struct EnsembleMetric<P: Item> {
    kind: Box<dyn EnsembleKind<P>>,
    settings: MetricSettings,
    previous_producer: Option<Arc<dyn EnsembleGenerator<P>>>,
    generating_protocol: Option<Arc<dyn EnsembleGenerator<P>>>,
    job: Arc<dyn JobContext>,
    items_seen: usize,
    finalized: bool,
    last_report: Option<String>,
}

impl<P: Item> fmt::Debug for EnsembleMetric<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EnsembleMetric")
            .field("kind", &self.kind.name())
            .field("settings", &self.settings)
            .field(
                "generating_protocol",
                &self.generating_protocol.as_ref().map(|p| p.name().to_string()),
            )
            .field("items_seen", &self.items_seen)
            .field("finalized", &self.finalized)
            .finish()
    }
}

impl<P: Item> EnsembleMetric<P> {
    /// Wraps a kind with default settings: tracer output, one repeat, one worker.
    pub fn new(kind: Box<dyn EnsembleKind<P>>) -> Self {
        Self {
            kind,
            settings: MetricSettings::default(),
            previous_producer: None,
            generating_protocol: None,
            job: Arc::new(NoJob),
            items_seen: 0,
            finalized: false,
            last_report: None,
        }
    }

    fn precondition(&self, code: &str, message: &str) -> EnsembleError {
        EnsembleError::Precondition(
            ErrorInfo::new(code, message).with_context("kind", self.kind.name()),
        )
    }

    fn config_error(&self, code: &str, message: impl Into<String>) -> EnsembleError {
        EnsembleError::Config(ErrorInfo::new(code, message).with_context("kind", self.kind.name()))
    }

    /// Name of the kind behind this metric.
    pub fn kind_name(&self) -> &str {
        self.kind.name()
    }

    /// The kind behind this metric.
    pub fn kind(&self) -> &dyn EnsembleKind<P> {
        self.kind.as_ref()
    }

    /// Typed access to the concrete kind.
    pub fn kind_as<K: 'static>(&self) -> Option<&K> {
        self.kind.as_any().downcast_ref::<K>()
    }

    pub(crate) fn kind_mut(&mut self) -> &mut dyn EnsembleKind<P> {
        self.kind.as_mut()
    }

    /// Names of the values readable after finalization.
    pub fn metric_names(&self) -> &'static [&'static str] {
        self.kind.metric_names()
    }

    /// Current settings.
    pub fn settings(&self) -> &MetricSettings {
        &self.settings
    }

    /// Sets the label prefix.
    pub fn set_label_prefix(&mut self, prefix: impl Into<String>) {
        self.settings.label_prefix = prefix.into();
    }

    /// Sets the label suffix.
    pub fn set_label_suffix(&mut self, suffix: impl Into<String>) {
        self.settings.label_suffix = suffix.into();
    }

    /// Selects the report sinks.
    pub fn set_output_mode(&mut self, mode: OutputMode) -> Result<(), EnsembleError> {
        if mode == OutputMode::Unknown {
            return Err(self
                .config_error("output_mode.unknown", "the output mode must be a known mode")
                .with_hint(VALID_MODES_HINT));
        }
        self.settings.output_mode = mode;
        Ok(())
    }

    /// Selects the report sinks by name (`tracer`, `tracer_and_file`, `file`).
    pub fn set_output_mode_name(&mut self, name: &str) -> Result<(), EnsembleError> {
        match OutputMode::from_name(name) {
            OutputMode::Unknown => Err(self
                .config_error(
                    "output_mode.unknown",
                    format!("\"{name}\" is not a recognised output mode"),
                )
                .with_hint(VALID_MODES_HINT)),
            mode => self.set_output_mode(mode),
        }
    }

    /// Current report sinks.
    pub fn output_mode(&self) -> OutputMode {
        self.settings.output_mode
    }

    /// Sets the report file name.
    pub fn set_output_filename(&mut self, filename: impl Into<String>) {
        self.settings.output_filename = filename.into();
    }

    /// Configured report file name; empty when unset.
    pub fn output_filename(&self) -> &str {
        &self.settings.output_filename
    }

    /// Sets or clears the protocol that makes this metric generate its own ensemble.
    pub fn set_ensemble_generating_protocol(
        &mut self,
        protocol: Option<Arc<dyn EnsembleGenerator<P>>>,
    ) {
        self.generating_protocol = protocol;
    }

    /// The protocol generating this metric's ensemble, if any.
    pub fn ensemble_generating_protocol(&self) -> Option<&Arc<dyn EnsembleGenerator<P>>> {
        self.generating_protocol.as_ref()
    }

    /// Sets how many times the generating protocol runs per `apply`.
    pub fn set_ensemble_generating_protocol_repeats(
        &mut self,
        repeats: usize,
    ) -> Result<(), EnsembleError> {
        if repeats == 0 {
            return Err(self.config_error(
                "ensemble.repeats_zero",
                "ensemble_generating_protocol_repeats must be at least 1",
            ));
        }
        self.settings.ensemble_generating_protocol_repeats = repeats;
        Ok(())
    }

    /// Sets the worker cap; 0 uses every available core.
    pub fn set_n_workers(&mut self, n_workers: usize) -> Result<(), EnsembleError> {
        #[cfg(not(feature = "parallel"))]
        if n_workers > 1 {
            return Err(self
                .config_error(
                    "ensemble.threads_unavailable",
                    "more than one worker was requested but this build has no thread support",
                )
                .with_context("n_workers", n_workers.to_string())
                .with_hint("enable the parallel feature or set n_workers to 1"));
        }
        self.settings.n_workers = n_workers;
        Ok(())
    }

    /// Sets the upstream step whose extra outputs may be absorbed.
    pub fn set_previous_producer(&mut self, producer: Option<Arc<dyn EnsembleGenerator<P>>>) {
        self.previous_producer = producer;
    }

    /// Enables absorbing every extra output of the previous producer.
    pub fn set_use_additional_output_from_last_producer(&mut self, enabled: bool) {
        self.settings.use_additional_output_from_last_producer = enabled;
    }

    /// Replaces the job identifiers used to label reports.
    pub fn set_job_context(&mut self, job: Arc<dyn JobContext>) {
        self.job = job;
    }

    /// True when reporting waits for an explicit end-of-run [`report`](Self::report).
    pub fn reports_at_end(&self) -> bool {
        self.generating_protocol.is_none() && !self.settings.use_additional_output_from_last_producer
    }

    /// Whether the summary has been reported.
    pub fn finalized(&self) -> bool {
        self.finalized
    }

    /// Items absorbed since the last reset.
    pub fn items_in_ensemble(&self) -> usize {
        self.items_seen
    }

    /// Text of the most recent report.
    pub fn last_report(&self) -> Option<&str> {
        self.last_report.as_deref()
    }

    /// `prefix_Kind_suffix`, omitting empty segments.
    pub fn label(&self) -> String {
        let mut label = String::new();
        if !self.settings.label_prefix.is_empty() {
            label.push_str(&self.settings.label_prefix);
            label.push('_');
        }
        label.push_str(self.kind.name());
        if !self.settings.label_suffix.is_empty() {
            label.push('_');
            label.push_str(&self.settings.label_suffix);
        }
        label
    }

    /// Applies the options shared by every kind (first configuration phase).
    pub fn configure_common(
        &mut self,
        tag: &MetricTag,
        resources: &Resources<P>,
    ) -> Result<(), EnsembleError> {
        if let Some(prefix) = tag.option::<String>("label_prefix")? {
            self.set_label_prefix(prefix);
        }
        if let Some(suffix) = tag.option::<String>("label_suffix")? {
            self.set_label_suffix(suffix);
        }
        if let Some(protocol) = tag.option::<String>("ensemble_generating_protocol")? {
            self.set_ensemble_generating_protocol(Some(resources.generator(&protocol)?));
            if let Some(repeats) = tag.option::<usize>("ensemble_generating_protocol_repeats")? {
                self.set_ensemble_generating_protocol_repeats(repeats)?;
            }
        } else if tag.has_option("ensemble_generating_protocol_repeats") {
            warn!(
                kind = self.kind.name(),
                "ensemble_generating_protocol_repeats was set without an ensemble_generating_protocol; ignoring it"
            );
        }
        if let Some(n_workers) = tag.option::<usize>("n_workers")? {
            self.set_n_workers(n_workers)?;
        }
        if let Some(enabled) = tag.option::<bool>("use_additional_output_from_last_producer")? {
            self.set_use_additional_output_from_last_producer(enabled);
        }
        if let Some(mode) = tag.option::<String>("output_mode")? {
            self.set_output_mode_name(&mode)?;
        }
        if let Some(filename) = tag.option::<String>("output_filename")? {
            if self.settings.output_mode == OutputMode::Tracer {
                return Err(self
                    .config_error(
                        "ensemble.filename_with_tracer",
                        "output_filename cannot be set when output_mode is tracer",
                    )
                    .with_hint("set output_mode to file or tracer_and_file"));
            }
            self.set_output_filename(filename);
        }
        debug!(kind = self.kind.name(), label = %self.label(), "configured common options");
        Ok(())
    }

    /// Feeds an item to the metric.
    ///
    /// With a generating protocol the item seeds a generated ensemble which
    /// is reported immediately. With multi-output passthrough the item and
    /// every extra output of the previous producer are absorbed and then
    /// reported. Otherwise the item is absorbed and reporting waits for an
    /// explicit [`report`](Self::report).
    pub fn apply(&mut self, item: &P) -> Result<(), EnsembleError> {
        if self.finalized {
            return Err(self.precondition(
                "ensemble.apply_after_finalize",
                "the ensemble metric has already reported; call reset before applying it again",
            ));
        }

        if let Some(protocol) = self.generating_protocol.clone() {
            let chain = if self.settings.use_additional_output_from_last_producer {
                self.previous_producer.clone()
            } else {
                None
            };
            let generator = ParallelEnsembleGenerator::new(
                protocol,
                self.settings.ensemble_generating_protocol_repeats,
                self.settings.n_workers,
            )
            .with_chain(chain);
            generator.run(item, self.kind.as_mut(), &mut self.items_seen)?;
            return self.report();
        }

        self.absorb(item)?;
        if self.settings.use_additional_output_from_last_producer {
            if let Some(producer) = self.previous_producer.clone() {
                let mut producer = producer.clone_boxed();
                while let Some(extra) = producer.additional_output() {
                    self.absorb(&extra)?;
                }
                return self.report();
            }
        }
        Ok(())
    }

    fn absorb(&mut self, item: &P) -> Result<(), EnsembleError> {
        let ordinal = self.items_seen + 1;
        self.kind.absorb(item, ordinal)?;
        self.items_seen = ordinal;
        Ok(())
    }

    /// Finalizes the kind and writes the report to the configured sinks.
    ///
    /// Reporting an already finalized metric does nothing.
    pub fn report(&mut self) -> Result<(), EnsembleError> {
        if self.finalized {
            debug!(kind = self.kind.name(), "already reported; skipping");
            return Ok(());
        }
        let mode = self.settings.output_mode;
        if mode == OutputMode::Unknown {
            return Err(EnsembleError::Internal(
                ErrorInfo::new("output_mode.unknown_enum", "metric holds an unknown output mode")
                    .with_context("kind", self.kind.name()),
            ));
        }
        let path = if mode.writes_file() {
            Some(
                report_file_path(
                    &self.settings.output_filename,
                    &self.settings.label_prefix,
                    &self.settings.label_suffix,
                    self.job.as_ref(),
                )
                .map_err(|err| err.with_context("kind", self.kind.name()))?,
            )
        } else {
            None
        };

        let body = self
            .kind
            .finalize_and_render()
            .map_err(|err| err.with_context("kind", self.kind.name()))?;
        let text = render_report(self.kind.name(), self.job.as_ref(), self.items_seen, &body);
        if let Some(path) = path {
            write_report_file(&path, &text)?;
        }
        if mode.writes_tracer() {
            emit_to_tracer(self.kind.name(), &self.label(), &text);
        }
        self.last_report = Some(text);
        self.finalized = true;
        Ok(())
    }

    /// Forgets all collected data; settings are kept.
    pub fn reset(&mut self) {
        self.kind.clear();
        self.items_seen = 0;
        self.finalized = false;
        self.last_report = None;
    }

    /// Reads a finalized value by name.
    pub fn get_value(&self, name: &str) -> Result<f64, EnsembleError> {
        if !self.finalized {
            return Err(self
                .precondition(
                    "ensemble.not_finalized",
                    "values can only be read after the metric has reported",
                )
                .with_context("name", name));
        }
        if !self.kind.metric_names().contains(&name) {
            return Err(EnsembleError::NotFound(
                ErrorInfo::new("ensemble.unknown_metric", "the kind does not declare this value")
                    .with_context("kind", self.kind.name())
                    .with_context("name", name)
                    .with_hint(format!("declared values: {}", self.kind.metric_names().join(", "))),
            ));
        }
        self.kind.value(name)
    }

    /// Whether this metric's kind can exchange summaries between processes.
    pub fn supports_distributed_collection(&self) -> bool {
        self.kind.supports_distributed_collection()
    }

    /// Sends this node's raw measurements to node `to`.
    pub fn send_summary(
        &self,
        transport: &dyn SummaryTransport,
        to: usize,
    ) -> Result<(), EnsembleError> {
        let packet = self.kind.summary_packet()?;
        transport.send(to, &packet)?;
        info!(
            kind = self.kind.name(),
            from = transport.rank(),
            to,
            count = packet.count,
            "sent ensemble summary"
        );
        Ok(())
    }

    /// Receives one summary from any node, merges it, and returns the source node.
    pub fn receive_summary(
        &mut self,
        transport: &dyn SummaryTransport,
    ) -> Result<usize, EnsembleError> {
        if self.finalized {
            return Err(self.precondition(
                "ensemble.receive_after_finalize",
                "cannot merge a summary into a metric that has already reported",
            ));
        }
        if !self.kind.supports_distributed_collection() {
            return Err(unsupported(self.kind.name(), "receive_summary"));
        }
        let (source, packet) = transport.receive()?;
        let count = packet.count;
        self.kind.absorb_packet(packet)?;
        self.items_seen += count;
        info!(
            kind = self.kind.name(),
            source,
            count,
            items_in_ensemble = self.items_seen,
            "received ensemble summary"
        );
        Ok(source)
    }
}

impl<P: Item> Drop for EnsembleMetric<P> {
    fn drop(&mut self) {
        if self.finalized || self.items_seen == 0 {
            return;
        }
        if let Err(err) = self.report() {
            error!(
                kind = self.kind.name(),
                items_in_ensemble = self.items_seen,
                error = %err,
                "failed to report ensemble metric on drop"
            );
        }
    }
}
