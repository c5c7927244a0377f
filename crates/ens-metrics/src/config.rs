use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use ens_core::errors::{EnsembleError, ErrorInfo};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::filters::GateSpec;
use crate::serde::{from_yaml_slice, from_yaml_value};

/// Configuration block for one ensemble metric.
///
/// Every key other than `kind` and `name` lands in `options` and is read in
/// two phases: the options shared by all kinds first, then the kind's own.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricTag {
    /// Registry key of the metric kind (e.g. `CentralTendency`).
    pub kind: String,
    /// Name under which the built metric is stored; defaults to `kind`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Remaining options keyed by name.
    #[serde(flatten)]
    pub options: BTreeMap<String, serde_yaml::Value>,
}

impl MetricTag {
    /// Creates a tag with no options.
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            name: None,
            options: BTreeMap::new(),
        }
    }

    /// Sets the storage name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Adds an option value. Strings, numbers, booleans and sequences of
    /// them convert directly.
    pub fn with_option(
        mut self,
        key: impl Into<String>,
        value: impl Into<serde_yaml::Value>,
    ) -> Self {
        self.options.insert(key.into(), value.into());
        self
    }

    /// Name under which the metric is stored.
    pub fn storage_name(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.kind)
    }

    /// Returns true when the option was supplied.
    pub fn has_option(&self, key: &str) -> bool {
        self.options.contains_key(key)
    }

    /// Reads an optional option, converting it to the requested type.
    pub fn option<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, EnsembleError> {
        match self.options.get(key) {
            None => Ok(None),
            Some(value) => from_yaml_value(value.clone()).map(Some).map_err(|err| {
                EnsembleError::Config(
                    ErrorInfo::new("config.option_type", "option has the wrong type")
                        .with_context("kind", self.kind.clone())
                        .with_context("option", key)
                        .with_hint(err.info().message.clone()),
                )
            }),
        }
    }

    /// Reads an option that must be present.
    pub fn required<T: DeserializeOwned>(&self, key: &str) -> Result<T, EnsembleError> {
        self.option(key)?.ok_or_else(|| {
            EnsembleError::Config(
                ErrorInfo::new("config.option_missing", "required option was not provided")
                    .with_context("kind", self.kind.clone())
                    .with_context("option", key),
            )
        })
    }
}

/// Top-level script configuration: metrics first, then the gates reading them.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ScriptConfig {
    /// Metric definitions in declaration order.
    #[serde(default)]
    pub ensemble_metrics: Vec<MetricTag>,
    /// Threshold gates over previously declared metrics.
    #[serde(default)]
    pub gates: Vec<GateSpec>,
}

/// Loads a script configuration from the provided YAML path.
pub fn load_script_config(path: &Path) -> Result<ScriptConfig, EnsembleError> {
    let bytes = fs::read(path).map_err(|err| {
        EnsembleError::Io(
            ErrorInfo::new("config.read", err.to_string())
                .with_context("path", path.display().to_string()),
        )
    })?;
    from_yaml_slice(&bytes)
}
