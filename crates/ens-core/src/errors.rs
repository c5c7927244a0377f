//! Structured error types shared across the ensemble metric crates.

use std::collections::BTreeMap;
use std::fmt::{self, Display};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Structured payload attached to every [`EnsembleError`] variant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorInfo {
    /// Stable machine readable error code.
    pub code: String,
    /// Human readable diagnostic message.
    pub message: String,
    /// Contextual key value pairs (metric kind, option names, counts, etc.).
    #[serde(default)]
    pub context: BTreeMap<String, String>,
    /// Optional hint that may help the caller resolve the issue.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
}

impl ErrorInfo {
    /// Creates a new error payload with the provided code and message.
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            context: BTreeMap::new(),
            hint: None,
        }
    }

    /// Adds a context entry to the payload.
    pub fn with_context(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.context.insert(key.into(), value.into());
        self
    }

    /// Sets a human readable hint for remediation.
    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }
}

/// Canonical error type for ensemble metrics, filters and their registry.
///
/// Every variant is terminal for the operation that produced it. The only
/// failure that is recovered locally is a single generator attempt, which
/// is never surfaced as an error at all.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Error)]
#[serde(tag = "family", content = "detail")]
pub enum EnsembleError {
    /// Configuration mistakes (bad option values, duplicate keys, missing filenames).
    #[error("config error: {0}")]
    Config(ErrorInfo),
    /// State machine violations such as absorbing after finalization.
    #[error("precondition error: {0}")]
    Precondition(ErrorInfo),
    /// Lookups of metric names, registry keys or resources that do not exist.
    #[error("not found: {0}")]
    NotFound(ErrorInfo),
    /// Data dependent failures, e.g. summarising an empty ensemble.
    #[error("data error: {0}")]
    Data(ErrorInfo),
    /// Capabilities a metric kind has not opted into.
    #[error("unsupported: {0}")]
    Unsupported(ErrorInfo),
    /// Filesystem errors while writing reports.
    #[error("io error: {0}")]
    Io(ErrorInfo),
    /// Serialization and schema errors.
    #[error("serde error: {0}")]
    Serde(ErrorInfo),
    /// Conditions that indicate a programming error.
    #[error("internal error: {0}")]
    Internal(ErrorInfo),
}

impl Display for ErrorInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (code: {})", self.message, self.code)?;
        if !self.context.is_empty() {
            write!(f, " | context: [")?;
            for (idx, (key, value)) in self.context.iter().enumerate() {
                if idx > 0 {
                    write!(f, ", ")?;
                }
                write!(f, "{key}={value}")?;
            }
            write!(f, "]")?;
        }
        if let Some(hint) = &self.hint {
            write!(f, " | hint: {hint}")?;
        }
        Ok(())
    }
}

impl EnsembleError {
    /// Returns a reference to the payload describing the error.
    pub fn info(&self) -> &ErrorInfo {
        match self {
            EnsembleError::Config(info)
            | EnsembleError::Precondition(info)
            | EnsembleError::NotFound(info)
            | EnsembleError::Data(info)
            | EnsembleError::Unsupported(info)
            | EnsembleError::Io(info)
            | EnsembleError::Serde(info)
            | EnsembleError::Internal(info) => info,
        }
    }

    /// Returns a mutable reference to the payload.
    pub fn info_mut(&mut self) -> &mut ErrorInfo {
        match self {
            EnsembleError::Config(info)
            | EnsembleError::Precondition(info)
            | EnsembleError::NotFound(info)
            | EnsembleError::Data(info)
            | EnsembleError::Unsupported(info)
            | EnsembleError::Io(info)
            | EnsembleError::Serde(info)
            | EnsembleError::Internal(info) => info,
        }
    }

    /// Returns the stable error code of the payload.
    pub fn code(&self) -> &str {
        &self.info().code
    }

    /// Adds a context entry, keeping the error family.
    pub fn with_context(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.info_mut().context.insert(key.into(), value.into());
        self
    }

    /// Sets the hint, keeping the error family.
    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.info_mut().hint = Some(hint.into());
        self
    }
}
