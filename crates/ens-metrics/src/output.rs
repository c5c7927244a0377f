use ens_core::errors::{EnsembleError, ErrorInfo};
use serde::{Deserialize, Serialize};

/// Destination of a metric's final report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputMode {
    /// Sentinel returned when a name cannot be parsed.
    Unknown,
    /// Report through the tracing sink only.
    #[default]
    Tracer,
    /// Report through tracing and to a file.
    TracerAndFile,
    /// Report to a file only.
    File,
}

impl OutputMode {
    /// Every valid (non-sentinel) mode, in declaration order.
    pub const VALID: [OutputMode; 3] = [
        OutputMode::Tracer,
        OutputMode::TracerAndFile,
        OutputMode::File,
    ];

    /// Parses a mode name, returning [`OutputMode::Unknown`] when unrecognised.
    pub fn from_name(name: &str) -> OutputMode {
        Self::VALID
            .into_iter()
            .find(|mode| mode.name().map(|n| n == name).unwrap_or(false))
            .unwrap_or(OutputMode::Unknown)
    }

    /// Returns the configuration name of the mode.
    ///
    /// Asking for the name of the sentinel is an internal error.
    pub fn name(self) -> Result<&'static str, EnsembleError> {
        match self {
            OutputMode::Tracer => Ok("tracer"),
            OutputMode::TracerAndFile => Ok("tracer_and_file"),
            OutputMode::File => Ok("file"),
            OutputMode::Unknown => Err(EnsembleError::Internal(ErrorInfo::new(
                "output_mode.unknown_enum",
                "no name exists for the unknown output mode",
            ))),
        }
    }

    /// True when reports go to the tracing sink.
    pub fn writes_tracer(self) -> bool {
        matches!(self, OutputMode::Tracer | OutputMode::TracerAndFile)
    }

    /// True when reports go to a file.
    pub fn writes_file(self) -> bool {
        matches!(self, OutputMode::TracerAndFile | OutputMode::File)
    }
}
