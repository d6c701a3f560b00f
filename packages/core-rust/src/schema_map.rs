//! Mapping-document loading and canonical-path lookups.
//!
//! A [`SchemaMap`] is the parsed, immutable form of one backend's mapping
//! document. Every value it hands out has already passed a grammar check, so
//! downstream SQL construction never sees unvalidated text. Maps are shared
//! read-only (`Arc<SchemaMap>`) across all adapters for a backend.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use serde_json::Value;

use crate::error::MappingError;
use crate::grammar;
use crate::version::SchemaVersion;

/// Key suffix that declares the physical table/view for an entity, e.g.
/// `"Customer.__source": "dbo.Customers"`.
pub const SOURCE_KEY_SUFFIX: &str = "__source";

/// Maximum object nesting accepted when flattening the `mappings` body.
const MAX_NESTING_DEPTH: usize = 16;

// ---------------------------------------------------------------------------
// SchemaMap
// ---------------------------------------------------------------------------

/// Immutable canonical-path → backend-expression map for one backend.
#[derive(Debug, Clone)]
pub struct SchemaMap {
    backend_name: String,
    version: SchemaVersion,
    mappings: BTreeMap<String, String>,
}

impl SchemaMap {
    /// Load a mapping document from a UTF-8 JSON file.
    ///
    /// # Errors
    ///
    /// Returns `MappingError::Invalid` if the file cannot be read, plus all
    /// the failure cases of [`SchemaMap::from_json_str`].
    pub fn from_file(path: &Path) -> Result<Self, MappingError> {
        let text = fs::read_to_string(path).map_err(|err| {
            MappingError::invalid(format!(
                "cannot read mapping document {}: {err}",
                path.display()
            ))
        })?;
        Self::from_json_str(&text)
    }

    /// Parse and validate a mapping document.
    ///
    /// The document is a JSON object with `backendName` and `schemaVersion`
    /// header fields and mappings either under a dedicated `mappings` object
    /// or at the root alongside the headers. Nested objects are flattened by
    /// joining segments with `.`; every leaf must be a string.
    ///
    /// # Errors
    ///
    /// Returns `MappingError::Invalid` when the root is not an object, a
    /// header is missing or malformed, a key or value fails its grammar, a
    /// leaf is not a string, nesting exceeds the depth bound, or no entity
    /// declares a `__source`. Returns `MappingError::IncompatibleVersion`
    /// when the major version is unsupported.
    pub fn from_json_str(text: &str) -> Result<Self, MappingError> {
        let root: Value = serde_json::from_str(text).map_err(|err| {
            MappingError::invalid(format!("mapping document is not valid JSON: {err}"))
        })?;
        let Value::Object(mut root) = root else {
            return Err(MappingError::invalid(
                "mapping document root must be a JSON object",
            ));
        };

        let backend_name = match root.remove("backendName") {
            Some(Value::String(name)) if !name.trim().is_empty() => name,
            Some(Value::String(_)) => {
                return Err(MappingError::invalid("backendName must not be empty"))
            }
            Some(_) => return Err(MappingError::invalid("backendName must be a string")),
            None => return Err(MappingError::invalid("backendName is required")),
        };

        let version = match root.remove("schemaVersion") {
            Some(Value::String(raw)) => raw.parse::<SchemaVersion>()?,
            Some(_) => return Err(MappingError::invalid("schemaVersion must be a string")),
            None => return Err(MappingError::invalid("schemaVersion is required")),
        };
        version.ensure_supported()?;

        let body = match root.remove("mappings") {
            Some(Value::Object(body)) => body,
            Some(_) => return Err(MappingError::invalid("mappings must be an object")),
            // No dedicated `mappings` key: the remaining root fields are the map.
            None => root,
        };

        let mut mappings = BTreeMap::new();
        flatten_into(&mut mappings, String::new(), body, 0)?;

        for (key, value) in &mappings {
            if !grammar::is_canonical_key(key) {
                return Err(MappingError::invalid(format!(
                    "canonical key `{key}` is outside the canonical-key grammar"
                )));
            }
            if key.ends_with(SOURCE_KEY_SUFFIX) {
                if !grammar::is_source_identifier(value) {
                    return Err(MappingError::invalid(format!(
                        "entity source `{value}` for `{key}` is outside the identifier grammar"
                    )));
                }
            } else if !grammar::is_backend_expression(value) {
                return Err(MappingError::invalid(format!(
                    "expression `{value}` for `{key}` is outside the expression grammar"
                )));
            }
        }

        if !mappings.keys().any(|key| key.ends_with(SOURCE_KEY_SUFFIX)) {
            return Err(MappingError::invalid(
                "mapping document declares no `__source` entries",
            ));
        }

        tracing::debug!(
            backend = %backend_name,
            version = %version,
            entries = mappings.len(),
            "mapping document loaded"
        );

        Ok(Self {
            backend_name,
            version,
            mappings,
        })
    }

    /// Backend name from the document header.
    #[must_use]
    pub fn backend_name(&self) -> &str {
        &self.backend_name
    }

    /// Document schema version.
    #[must_use]
    pub fn version(&self) -> SchemaVersion {
        self.version
    }

    /// Backend expression for a canonical path.
    ///
    /// # Errors
    ///
    /// Returns `MappingError::MissingKey` when the path has no mapping.
    pub fn target(&self, canonical_path: &str) -> Result<&str, MappingError> {
        self.try_target(canonical_path)
            .ok_or_else(|| MappingError::missing_key(canonical_path))
    }

    /// Non-failing probe for a canonical path.
    #[must_use]
    pub fn try_target(&self, canonical_path: &str) -> Option<&str> {
        self.mappings.get(canonical_path).map(String::as_str)
    }

    /// Batch lookup of `entity`-scoped fields, in the caller's field order.
    ///
    /// All-or-nothing: the first missing field aborts the whole lookup so a
    /// partial projection is never returned.
    ///
    /// # Errors
    ///
    /// Returns `MappingError::MissingKey` naming `entity.field` on the first
    /// miss.
    pub fn targets(
        &self,
        entity: &str,
        fields: &[&str],
    ) -> Result<Vec<(String, String)>, MappingError> {
        let mut resolved = Vec::with_capacity(fields.len());
        for field in fields {
            let key = format!("{entity}.{field}");
            match self.try_target(&key) {
                Some(expression) => resolved.push(((*field).to_string(), expression.to_string())),
                None => return Err(MappingError::missing_key(key)),
            }
        }
        Ok(resolved)
    }

    /// Physical table/view declared for `entity`.
    ///
    /// # Errors
    ///
    /// Returns `MappingError::MissingKey` when the entity declares no
    /// `__source`.
    pub fn entity_source(&self, entity: &str) -> Result<&str, MappingError> {
        self.target(&format!("{entity}.{SOURCE_KEY_SUFFIX}"))
    }
}

// ---------------------------------------------------------------------------
// Flattening
// ---------------------------------------------------------------------------

fn flatten_into(
    out: &mut BTreeMap<String, String>,
    prefix: String,
    object: serde_json::Map<String, Value>,
    depth: usize,
) -> Result<(), MappingError> {
    if depth >= MAX_NESTING_DEPTH {
        return Err(MappingError::invalid(format!(
            "mappings nest deeper than {MAX_NESTING_DEPTH} levels at `{prefix}`"
        )));
    }
    for (key, value) in object {
        let path = if prefix.is_empty() {
            key
        } else {
            format!("{prefix}.{key}")
        };
        match value {
            Value::String(leaf) => {
                out.insert(path, leaf);
            }
            Value::Object(nested) => flatten_into(out, path, nested, depth + 1)?,
            other => {
                return Err(MappingError::invalid(format!(
                    "mapping value at `{path}` must be a string or object, got {}",
                    json_type_name(&other)
                )))
            }
        }
    }
    Ok(())
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
