#![deny(missing_docs)]
#![doc = "Collaborator contracts and shared error types for ensemble metrics."]

use serde::{Deserialize, Serialize};

pub mod citation;
pub mod errors;

pub use citation::{Citation, CitationList, CitedModuleType};
pub use errors::{EnsembleError, ErrorInfo};

/// Opaque work item observed by ensemble metrics; only clone-by-value is required.
pub trait Item: Clone + Send + Sync + 'static {}

impl<T> Item for T where T: Clone + Send + Sync + 'static {}

/// Real-valued measurement extracted from a single item of an ensemble.
pub trait Measure<P>: Send + Sync {
    /// Returns the name used when reporting values produced by this measure.
    fn name(&self) -> &str;

    /// Computes the scalar value for the provided item.
    fn calculate(&self, item: &P) -> f64;
}

/// Outcome of applying an [`EnsembleGenerator`] to an item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MoveStatus {
    /// The item was transformed and may be measured.
    Success,
    /// The attempt failed; the item must not be measured.
    Failure,
}

impl MoveStatus {
    /// Returns true for [`MoveStatus::Success`].
    pub fn is_success(self) -> bool {
        matches!(self, MoveStatus::Success)
    }
}

/// Opaque protocol producing derived items from a seed item.
///
/// Implementations are shared between metrics, so they are never mutated in
/// place: callers obtain a private copy with [`EnsembleGenerator::clone_boxed`]
/// and drive that copy.
pub trait EnsembleGenerator<P>: Send + Sync {
    /// Returns a human readable identifier for log messages.
    fn name(&self) -> &str;

    /// Produces an independent copy of this generator.
    fn clone_boxed(&self) -> Box<dyn EnsembleGenerator<P>>;

    /// Transforms the item in place, reporting whether the attempt succeeded.
    fn apply(&mut self, item: &mut P) -> MoveStatus;

    /// Yields the next extra item produced by the last call to `apply`, if any.
    fn additional_output(&mut self) -> Option<P> {
        None
    }
}

/// Identifiers supplied by the host's job system, used to label reports.
pub trait JobContext: Send + Sync {
    /// Output name of the current job.
    fn job_name(&self) -> Option<String>;

    /// Index of the current structure within the job.
    fn nstruct_index(&self) -> Option<u64>;

    /// Rank of the current process when collection is distributed.
    fn process_rank(&self) -> Option<usize> {
        None
    }
}

/// Job context used when no job system is active.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NoJob;

impl JobContext for NoJob {
    fn job_name(&self) -> Option<String> {
        None
    }

    fn nstruct_index(&self) -> Option<u64> {
        None
    }
}

/// Fixed job identifiers, typically filled in by the host per job.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobInfo {
    /// Output name of the job.
    pub name: String,
    /// Index of the structure within the job.
    pub nstruct_index: u64,
    /// Optional process rank.
    #[serde(default)]
    pub process_rank: Option<usize>,
}

impl JobInfo {
    /// Creates job identifiers without a process rank.
    pub fn new(name: impl Into<String>, nstruct_index: u64) -> Self {
        Self {
            name: name.into(),
            nstruct_index,
            process_rank: None,
        }
    }

    /// Attaches a process rank.
    pub fn with_process_rank(mut self, rank: usize) -> Self {
        self.process_rank = Some(rank);
        self
    }
}

impl JobContext for JobInfo {
    fn job_name(&self) -> Option<String> {
        Some(self.name.clone())
    }

    fn nstruct_index(&self) -> Option<u64> {
        Some(self.nstruct_index)
    }

    fn process_rank(&self) -> Option<usize> {
        self.process_rank
    }
}
