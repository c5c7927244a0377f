use std::collections::BTreeMap;
use std::iter::FromIterator;

use ens_core::errors::{EnsembleError, ErrorInfo};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::{Map, Value};

fn serde_error(code: &str, err: impl ToString) -> EnsembleError {
    EnsembleError::Serde(ErrorInfo::new(code, err.to_string()))
}

fn canonicalize(value: Value) -> Value {
    match value {
        Value::Object(map) => {
            let ordered = map
                .into_iter()
                .map(|(key, value)| (key, canonicalize(value)))
                .collect::<BTreeMap<_, _>>();
            Value::Object(Map::from_iter(ordered))
        }
        Value::Array(values) => Value::Array(values.into_iter().map(canonicalize).collect()),
        other => other,
    }
}

/// Serializes a value into canonical JSON bytes with deterministic key ordering.
pub fn to_canonical_json_bytes<T: Serialize>(value: &T) -> Result<Vec<u8>, EnsembleError> {
    let value =
        serde_json::to_value(value).map_err(|err| serde_error("serde.json_serialize", err))?;
    let mut bytes = Vec::new();
    serde_json::to_writer(&mut bytes, &canonicalize(value))
        .map_err(|err| serde_error("serde.json_write", err))?;
    Ok(bytes)
}

/// Deserializes a value from JSON bytes.
pub fn from_json_slice<T: DeserializeOwned>(data: &[u8]) -> Result<T, EnsembleError> {
    serde_json::from_slice(data).map_err(|err| serde_error("serde.json_deserialize", err))
}

/// Deserializes a YAML payload into the requested type.
pub fn from_yaml_slice<T: DeserializeOwned>(data: &[u8]) -> Result<T, EnsembleError> {
    serde_yaml::from_slice(data).map_err(|err| serde_error("serde.yaml_deserialize", err))
}

/// Converts a single YAML value into the requested type.
pub fn from_yaml_value<T: DeserializeOwned>(value: serde_yaml::Value) -> Result<T, EnsembleError> {
    serde_yaml::from_value(value).map_err(|err| serde_error("serde.yaml_value", err))
}
