//! Error types for ODS operations

use thiserror::Error;

/// Errors raised by the container, the address parser, the schema registry
/// and the serialization adapters.
///
/// Validation errors are raised at the point of the offending call; nothing
/// is collected or retried internally.
#[derive(Error, Debug)]
pub enum OdsError {
    /// Malformed path syntax, or a path that conflicts with the node kind
    /// established at some ancestor
    #[error("Address error: {0}")]
    Address(String),

    /// Location not present in the schema of the configured version
    #[error("`{location}` is not a valid location in data dictionary version {version}")]
    SchemaLookup { location: String, version: String },

    /// Unknown schema version, or an operation disallowed by the current settings
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// A structurally valid location that was never assigned a value
    #[error("Missing data: {0}")]
    MissingLeaf(String),

    /// Index beyond the allocated length of a sequence
    #[error("Index {index} out of range for `{path}` (length {len})")]
    Index { path: String, index: i64, len: usize },

    /// Attempted conversion between mapping, sequence and leaf on a populated node
    #[error("Type error at `{path}`: {reason}")]
    Type { path: String, reason: String },

    /// Invalid value, or a failed requirement check
    #[error("Value error at `{path}`: {reason}")]
    Value { path: String, reason: String },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Encoding or decoding failure
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// External backend failure
    #[error("Backend error: {0}")]
    Backend(String),
}

/// Result alias used across the crate
pub type OdsResult<T> = Result<T, OdsError>;

impl OdsError {
    pub(crate) fn type_error(path: impl ToString, reason: impl Into<String>) -> Self {
        OdsError::Type {
            path: path.to_string(),
            reason: reason.into(),
        }
    }

    pub(crate) fn value_error(path: impl ToString, reason: impl Into<String>) -> Self {
        OdsError::Value {
            path: path.to_string(),
            reason: reason.into(),
        }
    }

    /// True for schema lookup failures, which bulk importers may downgrade to warnings
    pub fn is_schema_lookup(&self) -> bool {
        matches!(self, OdsError::SchemaLookup { .. })
    }

    /// True when the addressed data simply does not exist
    pub fn is_missing(&self) -> bool {
        matches!(self, OdsError::MissingLeaf(_))
    }
}

impl From<serde_json::Error> for OdsError {
    fn from(e: serde_json::Error) -> Self {
        OdsError::Serialization(format!("JSON: {}", e))
    }
}

impl From<serde_yaml::Error> for OdsError {
    fn from(e: serde_yaml::Error) -> Self {
        OdsError::Serialization(format!("YAML: {}", e))
    }
}

impl From<toml::de::Error> for OdsError {
    fn from(e: toml::de::Error) -> Self {
        OdsError::Configuration(format!("Invalid TOML: {}", e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_predicates() {
        let err = OdsError::SchemaLookup {
            location: "equilibrium.bad".to_string(),
            version: "3.20.0".to_string(),
        };
        assert!(err.is_schema_lookup());
        assert!(!err.is_missing());
        assert!(err.to_string().contains("equilibrium.bad"));
        assert!(OdsError::MissingLeaf("x".to_string()).is_missing());
    }
}
