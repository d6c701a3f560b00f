//! Mapping-layer error taxonomy.
//!
//! Everything that can go wrong while loading or querying a mapping document
//! is a deployment defect: it surfaces at startup, before any request is
//! served, and is never retried.

use thiserror::Error;

use crate::version::SchemaVersion;

/// Errors raised by mapping-document loading, lookup, and validation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MappingError {
    /// The document is malformed: bad JSON, missing header fields, a key or
    /// value outside its grammar, or no `__source` declarations.
    #[error("invalid mapping document: {reason}")]
    Invalid { reason: String },

    /// The document's major version does not match what this build supports.
    #[error("mapping schema version {found} is incompatible with supported major {supported}")]
    IncompatibleVersion {
        found: SchemaVersion,
        supported: u32,
    },

    /// A single canonical path has no mapping.
    #[error("no mapping for canonical path `{key}`")]
    MissingKey { key: String },

    /// A consumer's required keys are absent. All missing keys are collected
    /// before failing so one validation run reports the full set.
    #[error("`{consumer}` is missing required mappings: {}", .keys.join(", "))]
    MissingKeys { consumer: String, keys: Vec<String> },
}

impl MappingError {
    /// Create an `Invalid` error from any displayable reason.
    pub fn invalid(reason: impl Into<String>) -> Self {
        Self::Invalid {
            reason: reason.into(),
        }
    }

    /// Create a `MissingKey` error for the given canonical path.
    pub fn missing_key(key: impl Into<String>) -> Self {
        Self::MissingKey { key: key.into() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_keys_lists_every_key() {
        let err = MappingError::MissingKeys {
            consumer: "CustomerAdapter".to_string(),
            keys: vec!["Customer.Id".to_string(), "Customer.Email".to_string()],
        };
        assert_eq!(
            err.to_string(),
            "`CustomerAdapter` is missing required mappings: Customer.Id, Customer.Email"
        );
    }

    #[test]
    fn incompatible_version_names_both_sides() {
        let err = MappingError::IncompatibleVersion {
            found: SchemaVersion::new(2, 3),
            supported: 1,
        };
        assert!(err.to_string().contains("2.3"));
        assert!(err.to_string().contains("supported major 1"));
    }
}
