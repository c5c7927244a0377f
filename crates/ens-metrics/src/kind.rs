use std::any::Any;

use ens_core::errors::{EnsembleError, ErrorInfo};
use ens_core::{CitationList, Item};

use crate::config::MetricTag;
use crate::resources::Resources;
use crate::transport::SummaryPacket;

pub(crate) fn unsupported(kind: &str, operation: &str) -> EnsembleError {
    EnsembleError::Unsupported(
        ErrorInfo::new(
            "ensemble.distributed_collection",
            format!("the {kind} ensemble metric does not support distributed collection"),
        )
        .with_context("kind", kind)
        .with_context("operation", operation)
        .with_hint("implement summary_packet, absorb_packet and supports_distributed_collection together"),
    )
}

/// Data reduction behind an [`EnsembleMetric`](crate::metric::EnsembleMetric).
///
/// A kind owns the accumulated measurements. The engine drives it: it calls
/// `absorb` once per item, `finalize_and_render` once at report time, and
/// `clear` on reset. Configuration is never touched by `clear`.
pub trait EnsembleKind<P: Item>: Send {
    /// Registry key and display name of the kind.
    fn name(&self) -> &str;

    /// Names of the scalar values this kind exposes after finalization.
    fn metric_names(&self) -> &'static [&'static str];

    /// Reads kind specific options (second configuration phase).
    fn configure(&mut self, tag: &MetricTag, resources: &Resources<P>)
        -> Result<(), EnsembleError>;

    /// Adds one item to the ensemble. `ordinal` is the 1-based count
    /// including this item and is only used for diagnostics.
    fn absorb(&mut self, item: &P, ordinal: usize) -> Result<(), EnsembleError>;

    /// Computes derived values (idempotently) and renders the report block.
    ///
    /// The block must not end in a newline.
    fn finalize_and_render(&mut self) -> Result<String, EnsembleError>;

    /// Returns a finalized value by name.
    fn value(&self, metric_name: &str) -> Result<f64, EnsembleError>;

    /// Drops all accumulated and derived data.
    fn clear(&mut self);

    /// Authorship records for this kind.
    fn citations(&self) -> CitationList {
        CitationList::new()
    }

    /// Whether this kind can exchange summaries with other processes.
    fn supports_distributed_collection(&self) -> bool {
        false
    }

    /// Packs the raw measurements for transmission.
    fn summary_packet(&self) -> Result<SummaryPacket, EnsembleError> {
        Err(unsupported(self.name(), "send_summary"))
    }

    /// Appends measurements received from another process.
    fn absorb_packet(&mut self, _packet: SummaryPacket) -> Result<(), EnsembleError> {
        Err(unsupported(self.name(), "receive_summary"))
    }

    /// Upcast used for typed access to a concrete kind.
    fn as_any(&self) -> &dyn Any;
}
